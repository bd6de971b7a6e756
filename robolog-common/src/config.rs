use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::keyexpr::KEY_PREFIX;
use crate::serialization::Format;

/// Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Process logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Console tier settings.
///
/// Console-tier entries emit a `tracing` event on the `robolog::console`
/// target whenever their value changes, but only while `enabled` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Telemetry core settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Key expression prefix for live entries (default: "robolog").
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Logging tick period in milliseconds (default: 100).
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Encoding for exported samples and the durable log.
    #[serde(default)]
    pub format: Format,

    /// Durable log file. No file log is written when unset.
    #[serde(default)]
    pub durable_log: Option<PathBuf>,

    /// Console tier settings.
    #[serde(default)]
    pub console: ConsoleConfig,
}

fn default_key_prefix() -> String {
    KEY_PREFIX.to_string()
}

fn default_period_ms() -> u64 {
    100
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            period_ms: default_period_ms(),
            format: Format::default(),
            durable_log: None,
            console: ConsoleConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Validate the telemetry settings.
    pub fn validate(&self) -> Result<()> {
        if self.period_ms == 0 {
            return Err(Error::Config("period_ms must be greater than 0".to_string()));
        }
        if self.key_prefix.trim_matches('/').is_empty() {
            return Err(Error::Config("key_prefix cannot be empty".to_string()));
        }
        if self.key_prefix.contains('*') {
            return Err(Error::Config(format!(
                "key_prefix '{}' cannot contain wildcards",
                self.key_prefix
            )));
        }
        Ok(())
    }
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_telemetry_config() {
        let json5 = r#"
        {
            key_prefix: "team/robot",
            period_ms: 50,
            format: "cbor",
            durable_log: "/var/log/robolog/match.cbor",
            console: { enabled: true },
        }
        "#;

        let config: TelemetryConfig = parse_config(json5).unwrap();

        assert_eq!(config.key_prefix, "team/robot");
        assert_eq!(config.period_ms, 50);
        assert_eq!(config.format, Format::Cbor);
        assert_eq!(
            config.durable_log,
            Some(PathBuf::from("/var/log/robolog/match.cbor"))
        );
        assert!(config.console.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_default_config() {
        let config: TelemetryConfig = parse_config("{}").unwrap();

        assert_eq!(config.key_prefix, "robolog");
        assert_eq!(config.period_ms, 100);
        assert_eq!(config.format, Format::Json);
        assert!(config.durable_log.is_none());
        assert!(!config.console.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero: TelemetryConfig = parse_config("{ period_ms: 0 }").unwrap();
        assert!(zero.validate().is_err());

        let empty: TelemetryConfig = parse_config(r#"{ key_prefix: "/" }"#).unwrap();
        assert!(empty.validate().is_err());

        let wild: TelemetryConfig = parse_config(r#"{ key_prefix: "robolog/**" }"#).unwrap();
        assert!(wild.validate().is_err());
    }

    #[test]
    fn test_logging_and_zenoh_defaults() {
        let zenoh: ZenohConfig = parse_config("{}").unwrap();
        assert_eq!(zenoh.mode, "peer");
        assert!(zenoh.connect.is_empty());

        let logging: LoggingConfig = parse_config(r#"{ format: "json" }"#).unwrap();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, LogFormat::Json);
    }
}
