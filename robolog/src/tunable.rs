//! Live values that can be overridden from outside the process in test mode.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use robolog_common::join_path;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError, guarded};
use crate::frame::{Frame, SinkHandle, SinkSpec, SinkState, Tier};
use crate::loggable::Loggable;
use crate::value::EntryValue;

/// Read access to a tunable's current value.
#[derive(Debug, Clone)]
pub struct TunableHandle<T: Copy> {
    current: Rc<Cell<T>>,
}

impl<T: Copy> TunableHandle<T> {
    pub fn get(&self) -> T {
        self.current.get()
    }
}

/// A live entry whose value may be changed remotely while in test mode.
///
/// Each test-mode frame the live table value is compared to the current
/// value; a difference becomes the new current value and fires the
/// callback. On the first frame outside test mode after such a change, the
/// value resets to the one it started with. Outside test mode the live key
/// is forced back to the current value.
pub struct Tunable<T: EntryValue + Copy> {
    name: String,
    path: String,
    labels: BTreeMap<String, String>,
    initial: T,
    current: Rc<Cell<T>>,
    callback: Box<dyn FnMut(&T)>,
    needs_reset: bool,
    state: SinkState,
}

impl<T: EntryValue + Copy> Tunable<T> {
    /// Create a tunable starting at `initial`.
    ///
    /// Fails for value types that cannot be tuned.
    pub fn new(
        name: impl Into<String>,
        initial: T,
        callback: impl FnMut(&T) + 'static,
    ) -> Result<Self> {
        let name = name.into();
        if !T::KIND.is_tunable() {
            return Err(TelemetryError::UnsupportedTunable {
                path: name,
                kind: T::KIND,
            });
        }

        Ok(Self {
            path: name.clone(),
            name,
            labels: BTreeMap::new(),
            initial,
            current: Rc::new(Cell::new(initial)),
            callback: Box::new(callback),
            needs_reset: false,
            state: SinkState::Unpublished,
        })
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn handle(&self) -> TunableHandle<T> {
        TunableHandle {
            current: Rc::clone(&self.current),
        }
    }

    pub fn get(&self) -> T {
        self.current.get()
    }

    pub fn initial(&self) -> T {
        self.initial
    }

    /// Whether a test-mode override is waiting to be reset.
    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    fn notify(&mut self, value: T) {
        let callback = &mut self.callback;
        if let Err(e) = guarded(|| {
            callback(&value);
            Ok(())
        }) {
            warn!(path = %self.path, error = %e, "Tunable callback failed");
        }
    }

    fn ensure_published(&mut self, frame: &mut Frame<'_>) -> Option<SinkHandle> {
        match self.state {
            SinkState::Retired => None,
            SinkState::Published(handle) => Some(handle),
            SinkState::Unpublished => {
                let handle = frame.open(SinkSpec {
                    path: &self.path,
                    tier: Tier::Live,
                    kind: T::KIND,
                    labels: &self.labels,
                    writable: true,
                });
                frame.write(handle, &self.path, &self.current.get().to_value());
                self.state = SinkState::Published(handle);
                Some(handle)
            }
        }
    }
}

impl<T: EntryValue + Copy> Loggable for Tunable<T> {
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
        let Some(live) = handle.live else {
            return;
        };

        let remote = frame.live().get(live).and_then(T::from_value);

        if frame.mode().is_test() {
            if let Some(remote) = remote.filter(|remote| !remote.same(&self.current.get())) {
                info!(path = %self.path, value = ?remote.to_value(), "Tunable overridden");
                self.current.set(remote);
                self.notify(remote);
                frame.write(handle, &self.path, &remote.to_value());
                self.needs_reset = true;
            }
            return;
        }

        if self.needs_reset {
            info!(path = %self.path, value = ?self.initial.to_value(), "Tunable reset to startup value");
            self.needs_reset = false;
            self.current.set(self.initial);
            self.notify(self.initial);
        }

        let current = self.current.get();
        if !remote.is_some_and(|remote| remote.same(&current)) {
            debug!(path = %self.path, "Restoring tunable live value");
            frame.write(handle, &self.path, &current.to_value());
        }
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
    use std::cell::RefCell;

    use robolog_common::Value;

    use super::*;
    use crate::frame::{RunMode, Sinks};

    #[test]
    fn test_rejects_text() {
        let result = Tunable::new("name", 0_u8, |_| {});
        assert!(result.is_ok());

        // `String` is not `Copy`, so the kind check is exercised through a
        // wrapper type that advertises a text kind.
        #[derive(Clone, Copy, PartialEq)]
        struct Label;
        impl EntryValue for Label {
            const KIND: robolog_common::ValueKind = robolog_common::ValueKind::Text;
            fn to_value(&self) -> Value {
                Value::Text("label".to_string())
            }
            fn from_value(_: &Value) -> Option<Self> {
                Some(Label)
            }
        }

        assert!(matches!(
            Tunable::new("label", Label, |_| {}),
            Err(TelemetryError::UnsupportedTunable { .. })
        ));
    }

    #[test]
    fn test_remote_write_ignored_outside_test_mode() {
        let (mut sinks, _log) = Sinks::in_memory();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&calls);
        let mut tunable = Tunable::new("kP", 0.5_f64, move |v| seen.borrow_mut().push(*v)).unwrap();

        tunable.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        sinks
            .live_mut()
            .apply_remote("kP", Value::Number(2.0))
            .unwrap();
        tunable.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert_eq!(tunable.get(), 0.5);
        assert!(calls.borrow().is_empty());
        assert_eq!(sinks.live().get_path("kP"), Some(&Value::Number(0.5)));
    }

    #[test]
    fn test_override_and_reset() {
        let (mut sinks, _log) = Sinks::in_memory();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&calls);
        let mut tunable = Tunable::new("enabled", false, move |v| seen.borrow_mut().push(*v)).unwrap();
        let handle = tunable.handle();

        tunable.run(&mut Frame::new(&mut sinks, RunMode::Test));
        sinks
            .live_mut()
            .apply_remote("enabled", Value::Boolean(true))
            .unwrap();
        tunable.run(&mut Frame::new(&mut sinks, RunMode::Test));
        assert!(handle.get());
        assert!(tunable.needs_reset());

        tunable.run(&mut Frame::new(&mut sinks, RunMode::Disabled));
        assert!(!handle.get());
        assert!(!tunable.needs_reset());
        assert_eq!(*calls.borrow(), vec![true, false]);
        assert_eq!(sinks.live().get_path("enabled"), Some(&Value::Boolean(false)));
    }

    #[test]
    fn test_nan_override_fires_once() {
        let (mut sinks, _log) = Sinks::in_memory();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut tunable =
            Tunable::new("kF", 0.1_f64, move |_| counter.set(counter.get() + 1)).unwrap();

        tunable.run(&mut Frame::new(&mut sinks, RunMode::Test));
        sinks
            .live_mut()
            .apply_remote("kF", Value::Number(f64::NAN))
            .unwrap();
        for _ in 0..3 {
            tunable.run(&mut Frame::new(&mut sinks, RunMode::Test));
        }

        assert_eq!(calls.get(), 1);
        assert!(tunable.get().is_nan());
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let (mut sinks, _log) = Sinks::in_memory();
        let mut tunable = Tunable::new("kD", 1_i32, |v| {
            if *v > 10 {
                panic!("gain out of range");
            }
        })
        .unwrap();

        tunable.run(&mut Frame::new(&mut sinks, RunMode::Test));
        sinks
            .live_mut()
            .apply_remote("kD", Value::Integer(50))
            .unwrap();
        tunable.run(&mut Frame::new(&mut sinks, RunMode::Test));
        tunable.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert_eq!(tunable.get(), 1);
        assert_eq!(sinks.live().get_path("kD"), Some(&Value::Integer(1)));
    }
}
