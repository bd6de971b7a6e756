//! Error types for the telemetry core.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use robolog_common::ValueKind;
use thiserror::Error;

/// Boxed error returned by user accessors, fault suppliers and signal waits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using [`TelemetryError`].
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by the telemetry core.
///
/// None of these abort a frame: callers log them and carry on with the
/// remaining entries, suppliers or buses.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A member or entry value could not be read.
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: BoxError,
    },

    /// The object behind an accessor is mutably borrowed elsewhere.
    #[error("Object is mutably borrowed while reading '{0}'")]
    Busy(String),

    /// Tunables only accept numeric and boolean values.
    #[error("Unsupported tunable type {kind} at '{path}'")]
    UnsupportedTunable { path: String, kind: ValueKind },

    /// A member name cannot be used as a path segment.
    #[error("Invalid member name: {0}")]
    InvalidName(String),

    /// Nested loggables went deeper than the discovery limit.
    #[error("Discovery depth limit reached at '{0}'")]
    TooDeep(String),

    /// The durable log could not be written.
    #[error("Durable log error: {0}")]
    DurableLog(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the shared value/config layer.
    #[error(transparent)]
    Common(#[from] robolog_common::Error),
}

impl TelemetryError {
    /// Wrap an accessor error with the path being read.
    pub fn read(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Read {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create a durable log error.
    pub fn durable(msg: impl Into<String>) -> Self {
        Self::DurableLog(msg.into())
    }
}

/// Run user code, turning a panic into an error.
///
/// Accessors, fault suppliers and callbacks all run through this, so one
/// faulty instrument cannot stop the rest of the frame.
pub fn guarded<V>(
    f: impl FnOnce() -> std::result::Result<V, BoxError>,
) -> std::result::Result<V, BoxError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref())).into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for TelemetryError {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::DurableLog(err.to_string())
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        Self::DurableLog(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_passes_results_through() {
        assert_eq!(guarded(|| Ok(3)).unwrap(), 3);
        let err = guarded::<i32>(|| Err("no signal".into())).unwrap_err();
        assert_eq!(err.to_string(), "no signal");
    }

    #[test]
    fn test_guarded_catches_panics() {
        let samples: Vec<f64> = Vec::new();
        let err = guarded(|| Ok(samples[3])).unwrap_err();
        assert!(err.to_string().starts_with("panicked: "));

        let err = guarded::<()>(|| panic!("encoder {} lost", 4)).unwrap_err();
        assert_eq!(err.to_string(), "panicked: encoder 4 lost");
    }
}
