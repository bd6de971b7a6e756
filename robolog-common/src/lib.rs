//! robolog Common Library
//!
//! This crate provides shared types and utilities for the robolog telemetry core
//! and its bridges:
//!
//! - [`value`] - Live value model (`Value`, `ValueKind`, `LiveSample`)
//! - [`faults`] - Fault and fault-widget types
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Path composition and key expression builders
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod faults;
pub mod keyexpr;
pub mod serialization;
pub mod session;
pub mod value;

// Re-export commonly used types at the crate root
pub use config::{
    ConsoleConfig, LogFormat, LoggingConfig, TelemetryConfig, ZenohConfig, load_config,
    parse_config,
};
pub use error::{Error, Result};
pub use faults::{Fault, FaultSnapshot, FaultWidget, Severity};
pub use keyexpr::{KEY_PREFIX, KeyExprBuilder, join_path, validate_segment};
pub use serialization::{Format, decode, decode_auto, decode_lenient, encode};
pub use session::connect;
pub use value::{LiveSample, Value, ValueKind, current_timestamp_millis};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// use robolog_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
