//! Live table export to Zenoh.

use std::sync::Arc;

use robolog::LiveChange;
use robolog_common::{Format, KeyExprBuilder, LiveSample, encode};

use crate::error::{BridgeError, Result};

/// Publisher for sending live table changes to Zenoh.
///
/// Each [`LiveSample`] is put under `<prefix>/<path>` in the configured
/// format; unpublished entries are deleted from the same key.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
    format: Format,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(session: Arc<zenoh::Session>, key_prefix: &str, format: Format) -> Self {
        Self {
            session,
            keys: KeyExprBuilder::with_prefix(key_prefix),
            format,
        }
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        self.keys.prefix()
    }

    /// Get the key builder.
    pub fn keys(&self) -> &KeyExprBuilder {
        &self.keys
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Publish one sample under its entry path.
    pub async fn publish_sample(&self, sample: &LiveSample) -> Result<()> {
        let key = self.keys.build(&sample.path);
        let payload =
            encode(sample, self.format).map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.publish_raw(&key, payload).await
    }

    /// Delete the key of an unpublished entry.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let key = self.keys.build(path);
        self.session
            .delete(&key)
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.clone(),
                message: e.to_string(),
            })
    }

    /// Mirror drained live table changes.
    ///
    /// Failures are logged and counted; the remaining changes are still sent.
    pub async fn publish_changes(&self, changes: Vec<LiveChange>) -> PublishStats {
        let mut stats = PublishStats::default();

        for change in changes {
            let result = match &change {
                LiveChange::Set(sample) => self.publish_sample(sample).await,
                LiveChange::Removed(path) => self.delete(path).await,
            };
            match result {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, "Failed to export live change");
                }
            }
        }

        stats
    }

    /// Publish raw bytes to a key.
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Publish a JSON value to a key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload).await
    }
}

/// Statistics from one export pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Changes sent.
    pub success: usize,
    /// Changes that failed to send.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }

    /// Add the counts of another pass.
    pub fn merge(&mut self, other: PublishStats) {
        self.success += other.success;
        self.failed += other.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_stats() {
        let mut stats = PublishStats::default();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.success = 8;
        stats.failed = 2;
        assert_eq!(stats.total(), 10);
        assert_eq!(stats.success_rate(), 80.0);

        stats.merge(PublishStats {
            success: 2,
            failed: 0,
        });
        assert_eq!(stats.total(), 12);
    }
}
