//! Bridge status reporting.

use robolog::RunMode;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::Publisher;

/// Bridge status, published as JSON on `<prefix>/@/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name.
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("running", "offline", "error").
    pub status: String,
    /// Run mode of the frame loop.
    pub mode: RunMode,
    /// RFC 3339 time the status was produced.
    pub timestamp: String,
    /// Additional metadata.
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    fn with_state(bridge: &str, version: &str, status: &str, mode: RunMode) -> Self {
        Self {
            bridge: bridge.to_string(),
            version: version.to_string(),
            status: status.to_string(),
            mode,
            timestamp: chrono::Utc::now().to_rfc3339(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a status with "running" state.
    pub fn running(bridge: &str, version: &str, mode: RunMode) -> Self {
        Self::with_state(bridge, version, "running", mode)
    }

    /// Create a status with "offline" state.
    pub fn offline(bridge: &str, version: &str) -> Self {
        Self::with_state(bridge, version, "offline", RunMode::Disabled)
    }

    /// Create a status with "error" state.
    pub fn error(bridge: &str, version: &str, error: impl Into<String>) -> Self {
        Self::with_state(bridge, version, "error", RunMode::Disabled)
            .with_metadata(serde_json::json!({ "error": error.into() }))
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Publish this status to `{key_prefix}/@/status`.
    pub async fn publish(&self, publisher: &Publisher) -> Result<()> {
        let key = publisher.keys().status_key();
        publisher.publish_json(&key, self).await
    }
}

/// Publishes bridge status on startup, mode changes and shutdown.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    publisher: Publisher,
    bridge_name: String,
    version: String,
}

impl StatusPublisher {
    pub fn new(
        publisher: Publisher,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    /// Publish "running" status with optional metadata.
    pub async fn publish_running(
        &self,
        mode: RunMode,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut status = BridgeStatus::running(&self.bridge_name, &self.version, mode);
        if let Some(meta) = metadata {
            status = status.with_metadata(meta);
        }
        status.publish(&self.publisher).await
    }

    /// Publish "offline" status.
    pub async fn publish_offline(&self) -> Result<()> {
        BridgeStatus::offline(&self.bridge_name, &self.version)
            .publish(&self.publisher)
            .await
    }

    /// Publish "error" status.
    pub async fn publish_error(&self, error: impl Into<String>) -> Result<()> {
        BridgeStatus::error(&self.bridge_name, &self.version, error)
            .publish(&self.publisher)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_running() {
        let status = BridgeStatus::running("robolog", "0.2.0", RunMode::Teleop);
        assert_eq!(status.bridge, "robolog");
        assert_eq!(status.status, "running");
        assert_eq!(status.mode, RunMode::Teleop);
    }

    #[test]
    fn test_status_error_metadata() {
        let status = BridgeStatus::error("robolog", "0.2.0", "durable log full");
        assert_eq!(status.status, "error");
        assert_eq!(status.metadata["error"], "durable log full");
    }

    #[test]
    fn test_status_serialization() {
        let status = BridgeStatus::running("robolog", "0.2.0", RunMode::Test)
            .with_metadata(serde_json::json!({ "entries": 42 }));

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"bridge\":\"robolog\""));
        assert!(json.contains("\"mode\":\"test\""));
        assert!(json.contains("\"entries\":42"));
    }
}
