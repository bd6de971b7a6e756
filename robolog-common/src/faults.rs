//! Fault types shared between the registry and its consumers.
//!
//! Dashboards deserialize these without depending on the telemetry core.

use serde::{Deserialize, Serialize};

/// Fault severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A named health condition.
///
/// Two faults with identical fields are the same fault.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fault {
    /// Reporter identity, e.g. "SparkMax [7]".
    pub name: String,
    /// What went wrong.
    pub description: String,
    pub severity: Severity,
}

impl Fault {
    pub fn new(name: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn info(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, Severity::Info)
    }

    pub fn warning(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, Severity::Warning)
    }

    pub fn error(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, Severity::Error)
    }

    /// Render the line shown in fault widgets.
    pub fn display_line(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// One fault widget: a fault set split by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultWidget {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
}

impl FaultWidget {
    /// Split faults into the three severity columns, preserving iteration order.
    pub fn from_faults<'a>(faults: impl IntoIterator<Item = &'a Fault>) -> Self {
        let mut widget = Self::default();
        for fault in faults {
            let line = fault.display_line();
            match fault.severity {
                Severity::Error => widget.errors.push(line),
                Severity::Warning => widget.warnings.push(line),
                Severity::Info => widget.infos.push(line),
            }
        }
        widget
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.infos.is_empty()
    }
}

/// Snapshot of both fault widgets, published as one structured record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultSnapshot {
    /// Faults active on the last update.
    pub active: FaultWidget,
    /// Faults seen since the last clear.
    pub total: FaultWidget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_value_equality() {
        let a = Fault::warning("Pigeon2 [3]", "Undervoltage");
        let b = Fault::warning("Pigeon2 [3]", "Undervoltage");
        let c = Fault::error("Pigeon2 [3]", "Undervoltage");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_widget_split_by_severity() {
        let faults = [
            Fault::error("arm", "encoder disconnected"),
            Fault::warning("battery", "low voltage"),
            Fault::info("camera", "reconnecting"),
            Fault::error("intake", "stalled"),
        ];

        let widget = FaultWidget::from_faults(&faults);

        assert_eq!(
            widget.errors,
            vec!["arm: encoder disconnected", "intake: stalled"]
        );
        assert_eq!(widget.warnings, vec!["battery: low voltage"]);
        assert_eq!(widget.infos, vec!["camera: reconnecting"]);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Info), "info");
    }

    #[test]
    fn test_snapshot_deserialize() {
        let json = r#"{
            "active": { "errors": ["arm: stalled"], "warnings": [], "infos": [] },
            "total": { "errors": ["arm: stalled"], "warnings": ["bus: brownout"], "infos": [] }
        }"#;

        let snapshot: FaultSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.active.errors.len(), 1);
        assert_eq!(snapshot.total.warnings, vec!["bus: brownout"]);
    }
}
