//! Bridge configuration.

use std::path::Path;

use robolog::RunMode;
use robolog_common::{LoggingConfig, TelemetryConfig, ZenohConfig};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Complete bridge configuration, loaded from a JSON5 file.
///
/// ```json5
/// {
///     zenoh: { mode: "peer", listen: ["tcp/0.0.0.0:7447"] },
///     logging: { level: "info" },
///     robolog: {
///         key_prefix: "team254/robot",
///         period_ms: 20,
///         format: "cbor",
///         durable_log: "/var/log/robolog/match.cbor",
///         console: { enabled: true },
///     },
///     initial_mode: "disabled",
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Process logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telemetry core settings.
    #[serde(default)]
    pub robolog: TelemetryConfig,

    /// Run mode until one arrives on `<key_prefix>/@/mode`.
    #[serde(default)]
    pub initial_mode: RunMode,

    /// Publish bridge status on `<key_prefix>/@/status` (default: true).
    #[serde(default = "default_true")]
    pub status: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            zenoh: ZenohConfig::default(),
            logging: LoggingConfig::default(),
            robolog: TelemetryConfig::default(),
            initial_mode: RunMode::default(),
            status: true,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a file path.
    ///
    /// Calls [`validate`](Self::validate) after parsing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.zenoh.mode.as_str(), "client" | "peer" | "router") {
            return Err(BridgeError::validation(format!(
                "invalid zenoh mode '{}'",
                self.zenoh.mode
            )));
        }
        if self.zenoh.mode == "client" && self.zenoh.connect.is_empty() {
            return Err(BridgeError::validation(
                "client mode requires at least one connect endpoint",
            ));
        }
        self.robolog
            .validate()
            .map_err(|e| BridgeError::validation(e.to_string()))
    }

    /// Key expression prefix for everything the bridge publishes.
    pub fn key_prefix(&self) -> &str {
        &self.robolog.key_prefix
    }

    /// Logging configuration with an optional CLI level override applied.
    pub fn logging_with_override(&self, level: Option<&str>) -> LoggingConfig {
        let mut logging = self.logging.clone();
        if let Some(level) = level {
            logging.level = level.to_string();
        }
        logging
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use robolog_common::Format;

    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = BridgeConfig::parse(
            r#"{
                zenoh: { mode: "client", connect: ["tcp/10.2.54.2:7447"] },
                logging: { level: "debug", format: "json" },
                robolog: {
                    key_prefix: "team254/robot",
                    period_ms: 20,
                    format: "cbor",
                    durable_log: "logs/match.cbor",
                },
                initial_mode: "teleop",
                status: false,
            }"#,
        )
        .unwrap();

        assert_eq!(config.zenoh.connect, vec!["tcp/10.2.54.2:7447"]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.key_prefix(), "team254/robot");
        assert_eq!(config.robolog.period_ms, 20);
        assert_eq!(config.robolog.format, Format::Cbor);
        assert_eq!(
            config.robolog.durable_log,
            Some(PathBuf::from("logs/match.cbor"))
        );
        assert_eq!(config.initial_mode, RunMode::Teleop);
        assert!(!config.status);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BridgeConfig::parse("{}").unwrap();

        assert_eq!(config.zenoh.mode, "peer");
        assert_eq!(config.key_prefix(), "robolog");
        assert_eq!(config.robolog.period_ms, 100);
        assert_eq!(config.initial_mode, RunMode::Disabled);
        assert!(config.status);
    }

    #[test]
    fn test_validation_errors() {
        let bad_mode = BridgeConfig::parse(r#"{ zenoh: { mode: "mesh" } }"#);
        assert!(matches!(bad_mode, Err(BridgeError::ConfigValidation(_))));

        let lonely_client = BridgeConfig::parse(r#"{ zenoh: { mode: "client" } }"#);
        assert!(matches!(lonely_client, Err(BridgeError::ConfigValidation(_))));

        let zero_period = BridgeConfig::parse("{ robolog: { period_ms: 0 } }");
        assert!(matches!(zero_period, Err(BridgeError::ConfigValidation(_))));

        let unknown_mode = BridgeConfig::parse(r#"{ initial_mode: "sandstorm" }"#);
        assert!(matches!(unknown_mode, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_config_not_found() {
        let result = BridgeConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("robolog.json5");
        std::fs::write(&path, "{ robolog: { key_prefix: 'bench' } }").unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.key_prefix(), "bench");
    }

    #[test]
    fn test_log_level_override() {
        let config = BridgeConfig::default();
        assert_eq!(config.logging_with_override(None).level, "info");
        assert_eq!(config.logging_with_override(Some("trace")).level, "trace");
    }
}
