//! A single named value source.

use std::collections::BTreeMap;

use robolog_common::join_path;
use tracing::{debug, warn};

use crate::error::{BoxError, guarded};
use crate::frame::{Frame, SinkHandle, SinkSpec, SinkState, Tier};
use crate::loggable::Loggable;
use crate::value::EntryValue;

type Accessor<T> = Box<dyn FnMut() -> Result<T, BoxError>>;

/// One value, read from an accessor every frame and written only on change.
///
/// The sinks are opened on the first `run` and closed by `unpublish`, after
/// which the entry is retired for good.
pub struct Entry<T: EntryValue> {
    name: String,
    path: String,
    tier: Tier,
    labels: BTreeMap<String, String>,
    accessor: Accessor<T>,
    previous: Option<T>,
    state: SinkState,
    failing: bool,
}

impl<T: EntryValue> Entry<T> {
    /// Create an entry from an accessor that cannot fail.
    pub fn new(name: impl Into<String>, mut accessor: impl FnMut() -> T + 'static) -> Self {
        Self::fallible(name, move || Ok(accessor()))
    }

    /// Create an entry from an accessor that may fail.
    ///
    /// A failed or panicking read keeps the previous value and skips the write.
    pub fn fallible(
        name: impl Into<String>,
        accessor: impl FnMut() -> Result<T, BoxError> + 'static,
    ) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            tier: Tier::Live,
            labels: BTreeMap::new(),
            accessor: Box::new(accessor),
            previous: None,
            state: SinkState::Unpublished,
            failing: false,
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Last value written to the sinks.
    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    pub fn is_retired(&self) -> bool {
        self.state == SinkState::Retired
    }

    fn ensure_published(&mut self, frame: &mut Frame<'_>) -> Option<SinkHandle> {
        match self.state {
            SinkState::Retired => None,
            SinkState::Published(handle) => Some(handle),
            SinkState::Unpublished => {
                let handle = frame.open(SinkSpec {
                    path: &self.path,
                    tier: self.tier,
                    kind: T::KIND,
                    labels: &self.labels,
                    writable: false,
                });
                self.state = SinkState::Published(handle);
                Some(handle)
            }
        }
    }
}

impl<T: EntryValue> Loggable for Entry<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn attach(&mut self, parent: Option<&str>) {
        self.path = join_path(parent, &self.name);
    }

    fn run(&mut self, frame: &mut Frame<'_>) {
        let Some(handle) = self.ensure_published(frame) else {
            return;
        };

        let value = match guarded(|| (self.accessor)()) {
            Ok(value) => {
                if self.failing {
                    debug!(path = %self.path, "Entry readable again");
                    self.failing = false;
                }
                value
            }
            Err(e) => {
                if self.failing {
                    debug!(path = %self.path, error = %e, "Entry still unreadable");
                } else {
                    warn!(path = %self.path, error = %e, "Failed to read entry, keeping previous value");
                    self.failing = true;
                }
                return;
            }
        };

        if self.previous.as_ref().is_some_and(|previous| previous.same(&value)) {
            return;
        }

        frame.write(handle, &self.path, &value.to_value());
        self.previous = Some(value);
    }

    fn unpublish(&mut self, frame: &mut Frame<'_>) {
        if let SinkState::Published(handle) = self.state {
            frame.close(handle, &self.path);
        }
        self.state = SinkState::Retired;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use robolog_common::Value;

    use super::*;
    use crate::frame::{RunMode, Sinks};

    #[test]
    fn test_publishes_lazily() {
        let (mut sinks, _log) = Sinks::in_memory();
        let mut entry = Entry::new("speed", || 1.5_f64);

        assert!(!sinks.live().contains("speed"));
        entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        assert_eq!(sinks.live().get_path("speed"), Some(&Value::Number(1.5)));
    }

    #[test]
    fn test_writes_only_on_change() {
        let (mut sinks, log) = Sinks::in_memory();
        let source = Rc::new(Cell::new(1_i32));
        let reader = Rc::clone(&source);
        let mut entry = Entry::new("count", move || reader.get());

        for value in [1, 1, 2, 2, 2, 1] {
            source.set(value);
            entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        }

        assert_eq!(
            log.values_for("count"),
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(1)]
        );
    }

    #[test]
    fn test_failed_read_keeps_previous() {
        let (mut sinks, log) = Sinks::in_memory();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut entry = Entry::fallible("voltage", move || {
            counter.set(counter.get() + 1);
            if counter.get() == 2 {
                Err("bus timeout".into())
            } else {
                Ok(12.0_f64)
            }
        });

        for _ in 0..3 {
            entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        }

        assert_eq!(calls.get(), 3);
        assert_eq!(entry.previous(), Some(&12.0));
        assert_eq!(log.values_for("voltage"), vec![Value::Number(12.0)]);
    }

    #[test]
    fn test_panicking_read_keeps_previous() {
        let (mut sinks, log) = Sinks::in_memory();
        let samples = Rc::new(std::cell::RefCell::new(vec![0.25_f64]));
        let reader = Rc::clone(&samples);
        let mut entry = Entry::new("encoder", move || reader.borrow()[0]);

        entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        samples.borrow_mut().clear();
        entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        samples.borrow_mut().push(0.5);
        entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert_eq!(
            log.values_for("encoder"),
            vec![Value::Number(0.25), Value::Number(0.5)]
        );
    }

    #[test]
    fn test_constant_nan_written_once() {
        let (mut sinks, log) = Sinks::in_memory();
        let mut entry = Entry::new("gyroRate", || f64::NAN);

        for _ in 0..5 {
            entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        }

        assert_eq!(log.values_for("gyroRate").len(), 1);
    }

    #[test]
    fn test_retired_entry_never_republishes() {
        let (mut sinks, _log) = Sinks::in_memory();
        let mut entry = Entry::new("flag", || true);
        entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        entry.unpublish(&mut Frame::new(&mut sinks, RunMode::Teleop));
        entry.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert!(entry.is_retired());
        assert!(!sinks.live().contains("flag"));
    }

    #[test]
    fn test_attach_composes_path() {
        let mut entry = Entry::new("temperature", || 40.0_f64);
        entry.attach(Some("drivetrain/leftMotor"));
        assert_eq!(entry.path(), "drivetrain/leftMotor/temperature");
    }
}
