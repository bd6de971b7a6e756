//! Batched hardware signal refresh.
//!
//! Devices register their signal handles per bus during startup. Once
//! every device is registered, [`SignalRegistry::finalize_all`] freezes the
//! handles into one batch per bus, and each frame [`SignalManager::refresh`]
//! issues a single zero-timeout wait per batch instead of one blocking read
//! per signal.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::BoxError;

/// Something that can wait on many signals of one bus at once.
pub trait SignalWaiter {
    type Handle;

    /// Refresh every handle of `bus`, waiting at most `timeout`.
    fn wait_for_all(
        &mut self,
        bus: &str,
        timeout: Duration,
        handles: &[Self::Handle],
    ) -> Result<(), BoxError>;
}

/// Collects signal handles per bus until finalized.
#[derive(Debug)]
pub struct SignalRegistry<H> {
    pending: BTreeMap<String, Vec<H>>,
}

impl<H> Default for SignalRegistry<H> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }
}

impl<H> SignalRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handles on `bus`.
    pub fn register(&mut self, bus: &str, handles: impl IntoIterator<Item = H>) {
        self.pending
            .entry(bus.to_string())
            .or_default()
            .extend(handles);
    }

    /// Total number of registered handles.
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the registry into one batch per non-empty bus.
    pub fn finalize_all(self) -> SignalManager<H> {
        let batches: Vec<SignalBatch<H>> = self
            .pending
            .into_iter()
            .filter(|(_, handles)| !handles.is_empty())
            .map(|(bus, handles)| SignalBatch {
                bus,
                handles: handles.into_boxed_slice(),
            })
            .collect();

        for batch in &batches {
            info!(bus = %batch.bus, signals = batch.handles.len(), "Finalized signal batch");
        }

        SignalManager { batches }
    }
}

/// Frozen signal handles of one bus.
#[derive(Debug)]
pub struct SignalBatch<H> {
    bus: String,
    handles: Box<[H]>,
}

impl<H> SignalBatch<H> {
    pub fn bus(&self) -> &str {
        &self.bus
    }

    pub fn handles(&self) -> &[H] {
        &self.handles
    }
}

/// Outcome of one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Wait calls issued.
    pub waits: usize,
    /// Wait calls that failed.
    pub failed: usize,
    /// Signals covered by the waits.
    pub signals: usize,
}

/// Refreshes every finalized batch once per frame.
#[derive(Debug)]
pub struct SignalManager<H> {
    batches: Vec<SignalBatch<H>>,
}

impl<H> SignalManager<H> {
    pub fn batches(&self) -> &[SignalBatch<H>] {
        &self.batches
    }

    /// Issue one zero-timeout wait per bus.
    ///
    /// A failing bus is logged; the remaining buses are still refreshed.
    pub fn refresh<W>(&self, waiter: &mut W) -> RefreshStats
    where
        W: SignalWaiter<Handle = H>,
    {
        let mut stats = RefreshStats::default();

        for batch in &self.batches {
            stats.waits += 1;
            stats.signals += batch.handles.len();
            if let Err(e) = waiter.wait_for_all(&batch.bus, Duration::ZERO, &batch.handles) {
                stats.failed += 1;
                warn!(bus = %batch.bus, error = %e, "Signal refresh failed");
            }
        }

        debug!(waits = stats.waits, signals = stats.signals, "Refreshed signals");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingWaiter {
        calls: Vec<(String, usize)>,
        broken_bus: Option<String>,
    }

    impl SignalWaiter for CountingWaiter {
        type Handle = u32;

        fn wait_for_all(
            &mut self,
            bus: &str,
            timeout: Duration,
            handles: &[u32],
        ) -> Result<(), BoxError> {
            assert_eq!(timeout, Duration::ZERO);
            self.calls.push((bus.to_string(), handles.len()));
            if self.broken_bus.as_deref() == Some(bus) {
                return Err("bus off".into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_registration_accumulates_per_bus() {
        let mut registry = SignalRegistry::new();
        registry.register("rio", [1, 2]);
        registry.register("canivore", [3]);
        registry.register("rio", [4]);
        registry.register("empty", []);

        assert_eq!(registry.len(), 4);
        let manager = registry.finalize_all();
        assert_eq!(manager.batches().len(), 2);
        assert_eq!(manager.batches()[1].handles(), &[1, 2, 4]);
    }

    #[test]
    fn test_failing_bus_does_not_block_others() {
        let mut registry = SignalRegistry::new();
        registry.register("canivore", [1, 2, 3]);
        registry.register("rio", [4, 5]);
        let manager = registry.finalize_all();

        let mut waiter = CountingWaiter {
            broken_bus: Some("canivore".to_string()),
            ..Default::default()
        };
        let stats = manager.refresh(&mut waiter);

        assert_eq!(
            stats,
            RefreshStats {
                waits: 2,
                failed: 1,
                signals: 5
            }
        );
        assert_eq!(waiter.calls[1], ("rio".to_string(), 2));
    }
}
