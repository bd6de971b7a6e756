use crate::error::{Error, Result};

/// Default key expression prefix for all robolog telemetry.
pub const KEY_PREFIX: &str = "robolog";

/// Path separator between group segments.
pub const SEPARATOR: char = '/';

/// Group path of the "active faults" widget.
pub const FAULTS_ACTIVE_PATH: &str = "faults/active";

/// Group path of the "total faults" widget.
pub const FAULTS_TOTAL_PATH: &str = "faults/total";

/// Compose a child path from its parent path and its own name.
///
/// # Example
/// ```
/// use robolog_common::keyexpr::join_path;
///
/// assert_eq!(join_path(None, "drivetrain"), "drivetrain");
/// assert_eq!(join_path(Some("drivetrain"), "leftMotor"), "drivetrain/leftMotor");
/// ```
pub fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}{}{}", parent, SEPARATOR, name),
        _ => name.to_string(),
    }
}

/// Check that a name can be used as a single path segment.
///
/// Segments must be non-empty and free of separators and Zenoh wildcard or
/// metadata characters.
pub fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::KeyPath("empty segment".to_string()));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '/' | '*' | '$' | '?' | '#' | '@')) {
        return Err(Error::KeyPath(format!(
            "segment '{}' contains reserved character '{}'",
            name, c
        )));
    }
    Ok(())
}

/// Builder for constructing robolog key expressions.
///
/// Key expressions follow the pattern:
/// `<prefix>/<group path>/<entry name>`
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl Default for KeyExprBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyExprBuilder {
    /// Create a builder using [`KEY_PREFIX`].
    pub fn new() -> Self {
        Self {
            prefix: KEY_PREFIX.to_string(),
        }
    }

    /// Create a builder with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches(SEPARATOR).to_string(),
        }
    }

    /// Get the prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the key expression for an entry path.
    ///
    /// # Example
    /// ```
    /// use robolog_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new();
    /// let key = builder.build("drivetrain/leftMotor/temperature");
    /// assert_eq!(key, "robolog/drivetrain/leftMotor/temperature");
    /// ```
    pub fn build(&self, path: &str) -> String {
        format!("{}{}{}", self.prefix, SEPARATOR, path)
    }

    /// Build a wildcard matching every entry under the prefix.
    ///
    /// # Example
    /// ```
    /// use robolog_common::keyexpr::KeyExprBuilder;
    ///
    /// assert_eq!(KeyExprBuilder::new().wildcard(), "robolog/**");
    /// ```
    pub fn wildcard(&self) -> String {
        format!("{}/**", self.prefix)
    }

    /// Build the key carrying the robot run mode.
    ///
    /// # Example
    /// ```
    /// use robolog_common::keyexpr::KeyExprBuilder;
    ///
    /// assert_eq!(KeyExprBuilder::new().mode_key(), "robolog/@/mode");
    /// ```
    pub fn mode_key(&self) -> String {
        format!("{}/@/mode", self.prefix)
    }

    /// Build the key for bridge status.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }

    /// Build the key for the structured fault snapshot.
    pub fn faults_key(&self) -> String {
        format!("{}/@/faults", self.prefix)
    }

    /// Strip the prefix from a key expression, returning the entry path.
    ///
    /// Returns `None` for keys outside the prefix and for `@` metadata keys.
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        let rest = key.strip_prefix(self.prefix.as_str())?;
        let path = rest.strip_prefix(SEPARATOR)?;
        if path.is_empty() || path.starts_with('@') {
            return None;
        }
        Some(path)
    }
}
