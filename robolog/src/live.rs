//! The in-process live table.
//!
//! Every live entry owns one slot, keyed by its full path. Local writes are
//! queued in an outbox that exporters drain; remote writes are only accepted
//! on slots published as writable and never enter the outbox.

use std::collections::{BTreeMap, HashMap, VecDeque};

use robolog_common::{LiveSample, Value, ValueKind};
use thiserror::Error;
use tracing::{debug, warn};

/// Outbox capacity before the oldest pending changes are dropped.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 16 * 1024;

/// Handle to a live slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiveId(usize);

/// A change exporters must mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveChange {
    /// A slot received a new value.
    Set(LiveSample),
    /// A slot was unpublished.
    Removed(String),
}

/// Reasons an inbound write is refused.
#[derive(Debug, Error, PartialEq)]
pub enum RemoteWriteError {
    #[error("no published entry at '{0}'")]
    Unknown(String),

    #[error("entry '{0}' is read-only")]
    ReadOnly(String),

    #[error("entry '{path}' expects {expected}, got {actual}")]
    KindMismatch {
        path: String,
        expected: ValueKind,
        actual: ValueKind,
    },
}

#[derive(Debug)]
struct Slot {
    path: String,
    kind: ValueKind,
    labels: BTreeMap<String, String>,
    writable: bool,
    published: bool,
    value: Option<Value>,
}

/// Hierarchical key/value table shared by every live entry.
#[derive(Debug)]
pub struct LiveTable {
    slots: Vec<Slot>,
    index: HashMap<String, LiveId>,
    outbox: VecDeque<LiveChange>,
    capacity: usize,
    dropped: u64,
}

impl Default for LiveTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }

    /// Create an empty table whose outbox holds at most `capacity` changes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            outbox: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Publish a slot at `path`.
    ///
    /// Publishing a path twice returns the existing slot; the second
    /// publisher then shares it, which is logged since two entries should
    /// never resolve to the same path.
    pub fn publish(
        &mut self,
        path: &str,
        kind: ValueKind,
        labels: &BTreeMap<String, String>,
        writable: bool,
    ) -> LiveId {
        if let Some(&id) = self.index.get(path) {
            let slot = &mut self.slots[id.0];
            if slot.published {
                warn!(path = %path, "Live path published twice");
            }
            slot.published = true;
            slot.kind = kind;
            slot.writable |= writable;
            return id;
        }

        let id = LiveId(self.slots.len());
        self.slots.push(Slot {
            path: path.to_string(),
            kind,
            labels: labels.clone(),
            writable,
            published: true,
            value: None,
        });
        self.index.insert(path.to_string(), id);
        debug!(path = %path, kind = %kind, writable, "Published live entry");
        id
    }

    /// Store a locally produced value and queue it for exporters.
    pub fn set(&mut self, id: LiveId, value: Value) {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return;
        };
        if !slot.published {
            return;
        }

        let mut sample = LiveSample::new(slot.path.clone(), value.clone());
        sample.labels = slot.labels.clone();
        slot.value = Some(value);
        self.push(LiveChange::Set(sample));
    }

    /// Current value of a slot.
    pub fn get(&self, id: LiveId) -> Option<&Value> {
        self.slots
            .get(id.0)
            .filter(|slot| slot.published)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Current value at a path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        self.index.get(path).and_then(|&id| self.get(id))
    }

    /// Whether a published slot exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.index
            .get(path)
            .is_some_and(|id| self.slots[id.0].published)
    }

    /// Remove a slot's value and announce the removal.
    pub fn unpublish(&mut self, id: LiveId) {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return;
        };
        if !slot.published {
            return;
        }
        slot.published = false;
        slot.value = None;
        let path = slot.path.clone();
        debug!(path = %path, "Unpublished live entry");
        self.push(LiveChange::Removed(path));
    }

    /// Accept a value written from outside the process.
    ///
    /// Integers are widened when the slot holds numbers.
    pub fn apply_remote(&mut self, path: &str, value: Value) -> Result<(), RemoteWriteError> {
        let id = self
            .index
            .get(path)
            .copied()
            .ok_or_else(|| RemoteWriteError::Unknown(path.to_string()))?;
        let slot = &mut self.slots[id.0];

        if !slot.published {
            return Err(RemoteWriteError::Unknown(path.to_string()));
        }
        if !slot.writable {
            return Err(RemoteWriteError::ReadOnly(path.to_string()));
        }

        let value = match (slot.kind, value) {
            (ValueKind::Number, Value::Integer(v)) => Value::Number(v as f64),
            (_, value) => value,
        };
        if value.kind() != slot.kind {
            return Err(RemoteWriteError::KindMismatch {
                path: path.to_string(),
                expected: slot.kind,
                actual: value.kind(),
            });
        }

        slot.value = Some(value);
        Ok(())
    }

    /// Drain pending changes for export.
    pub fn take_changes(&mut self) -> Vec<LiveChange> {
        self.outbox.drain(..).collect()
    }

    /// Number of changes waiting for export.
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Changes dropped because the outbox was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Paths of all currently published slots, in publication order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|slot| slot.published)
            .map(|slot| slot.path.as_str())
    }

    /// Paths of all writable slots.
    pub fn writable_paths(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|slot| slot.published && slot.writable)
            .map(|slot| slot.path.as_str())
    }

    fn push(&mut self, change: LiveChange) {
        if self.outbox.len() >= self.capacity {
            self.outbox.pop_front();
            self.dropped += 1;
        }
        self.outbox.push_back(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_labels() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_publish_set_get() {
        let mut table = LiveTable::new();
        let id = table.publish("arm/angle", ValueKind::Number, &no_labels(), false);

        assert!(table.contains("arm/angle"));
        assert_eq!(table.get(id), None);

        table.set(id, Value::Number(12.5));
        assert_eq!(table.get_path("arm/angle"), Some(&Value::Number(12.5)));

        let changes = table.take_changes();
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            LiveChange::Set(sample) => assert_eq!(sample.path, "arm/angle"),
            other => panic!("unexpected change: {:?}", other),
        }
        assert_eq!(table.pending(), 0);
    }

    #[test]
    fn test_remote_write_rules() {
        let mut table = LiveTable::new();
        table.publish("arm/kP", ValueKind::Number, &no_labels(), true);
        table.publish("arm/angle", ValueKind::Number, &no_labels(), false);
        table.publish("arm/enabled", ValueKind::Boolean, &no_labels(), true);

        assert_eq!(table.apply_remote("arm/kP", Value::Integer(2)), Ok(()));
        assert_eq!(table.get_path("arm/kP"), Some(&Value::Number(2.0)));

        assert_eq!(
            table.apply_remote("arm/angle", Value::Number(1.0)),
            Err(RemoteWriteError::ReadOnly("arm/angle".to_string()))
        );
        assert_eq!(
            table.apply_remote("arm/missing", Value::Number(1.0)),
            Err(RemoteWriteError::Unknown("arm/missing".to_string()))
        );
        assert!(matches!(
            table.apply_remote("arm/enabled", Value::Number(1.0)),
            Err(RemoteWriteError::KindMismatch { .. })
        ));

        // Remote writes are not echoed to exporters
        assert_eq!(table.pending(), 0);
    }

    #[test]
    fn test_unpublish_announces_removal() {
        let mut table = LiveTable::new();
        let id = table.publish("intake/rollers", ValueKind::Boolean, &no_labels(), false);
        table.set(id, Value::Boolean(true));
        table.take_changes();

        table.unpublish(id);
        table.unpublish(id);

        assert!(!table.contains("intake/rollers"));
        assert_eq!(
            table.take_changes(),
            vec![LiveChange::Removed("intake/rollers".to_string())]
        );

        // Writes to an unpublished slot are ignored
        table.set(id, Value::Boolean(false));
        assert_eq!(table.pending(), 0);
    }

    #[test]
    fn test_outbox_drops_oldest_when_full() {
        let mut table = LiveTable::with_capacity(2);
        let id = table.publish("counter", ValueKind::Integer, &no_labels(), false);

        for i in 0..5 {
            table.set(id, Value::Integer(i));
        }

        assert_eq!(table.pending(), 2);
        assert_eq!(table.dropped(), 3);
        let changes = table.take_changes();
        match &changes[1] {
            LiveChange::Set(sample) => assert_eq!(sample.value, Value::Integer(4)),
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_labels_travel_with_samples() {
        let mut table = LiveTable::new();
        let mut labels = BTreeMap::new();
        labels.insert("subsystem".to_string(), "drive".to_string());
        let id = table.publish("drive/speed", ValueKind::Number, &labels, false);
        table.set(id, Value::Number(1.0));

        match &table.take_changes()[0] {
            LiveChange::Set(sample) => {
                assert_eq!(sample.labels.get("subsystem"), Some(&"drive".to_string()))
            }
            other => panic!("unexpected change: {:?}", other),
        }
    }
}
