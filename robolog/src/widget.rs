//! Interactive widgets: a typed property set published eagerly at init.
//!
//! A widget publishes a `.type` key naming its dashboard representation and
//! one key per property. Editable properties are published writable and
//! apply dashboard edits to the underlying object.

use std::collections::BTreeMap;
use std::rc::Rc;

use robolog_common::join_path;
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::guarded;
use crate::frame::{Frame, SinkHandle, SinkSpec, SinkState, Tier};
use crate::loggable::{Loggable, Shared};
use crate::value::EntryValue;

/// Key under a widget holding its type name.
pub const WIDGET_TYPE_KEY: &str = ".type";

/// A type with a native dashboard widget.
pub trait Widget: 'static {
    /// Widget type advertised under [`WIDGET_TYPE_KEY`].
    const WIDGET_TYPE: &'static str;

    /// Declare the widget's properties.
    fn properties(props: &mut WidgetProps<Self>)
    where
        Self: Sized;
}

/// Property registrar handed to [`Widget::properties`].
pub struct WidgetProps<W> {
    object: Shared<W>,
    labels: BTreeMap<String, String>,
    properties: Vec<Box<dyn Loggable>>,
}

impl<W: 'static> WidgetProps<W> {
    /// Add a read-only property.
    pub fn read<V: EntryValue>(
        &mut self,
        name: &str,
        get: impl Fn(&W) -> V + 'static,
    ) -> &mut Self {
        self.push(Property {
            name: name.to_string(),
            path: name.to_string(),
            object: Rc::clone(&self.object),
            labels: self.labels.clone(),
            get: Box::new(get),
            set: None,
            previous: None,
            state: SinkState::Unpublished,
            failing: false,
        })
    }

    /// Add a property the dashboard may edit.
    pub fn edit<V: EntryValue>(
        &mut self,
        name: &str,
        get: impl Fn(&W) -> V + 'static,
        set: impl Fn(&mut W, V) + 'static,
    ) -> &mut Self {
        self.push(Property {
            name: name.to_string(),
            path: name.to_string(),
            object: Rc::clone(&self.object),
            labels: self.labels.clone(),
            get: Box::new(get),
            set: Some(Box::new(set)),
            previous: None,
            state: SinkState::Unpublished,
            failing: false,
        })
    }

    fn push(&mut self, property: impl Loggable + 'static) -> &mut Self {
        self.properties.push(Box::new(property));
        self
    }
}

struct Property<W, V> {
    name: String,
    path: String,
    object: Shared<W>,
    labels: BTreeMap<String, String>,
    get: Box<dyn Fn(&W) -> V>,
    set: Option<Box<dyn Fn(&mut W, V)>>,
    previous: Option<V>,
    state: SinkState,
    failing: bool,
}

impl<W, V: EntryValue> Property<W, V> {
    fn ensure_published(&mut self, frame: &mut Frame<'_>) -> Option<SinkHandle> {
        match self.state {
            SinkState::Retired => None,
            SinkState::Published(handle) => Some(handle),
            SinkState::Unpublished => {
                let handle = frame.open(SinkSpec {
                    path: &self.path,
                    tier: Tier::Live,
                    kind: V::KIND,
                    labels: &self.labels,
                    writable: self.set.is_some(),
                });
                self.state = SinkState::Published(handle);
                Some(handle)
            }
        }
    }

    fn apply_edit(&mut self, frame: &Frame<'_>, handle: SinkHandle) {
        let Some(set) = &self.set else {
            return;
        };
        let Some(previous) = &self.previous else {
            return;
        };
        let Some(edited) = handle
            .live
            .and_then(|id| frame.live().get(id))
            .and_then(V::from_value)
        else {
            return;
        };
        if edited.same(previous) {
            return;
        }

        match self.object.try_borrow_mut() {
            Ok(mut object) => {
                debug!(path = %self.path, value = ?edited.to_value(), "Applying widget edit");
                let applied = guarded(|| {
                    set(&mut *object, edited.clone());
                    Ok(())
                });
                if let Err(e) = applied {
                    warn!(path = %self.path, error = %e, "Widget edit failed");
                }
                self.previous = Some(edited);
            }
            Err(_) => warn!(path = %self.path, "Widget object busy, edit deferred"),
        }
    }

    fn publish_current(&mut self, frame: &mut Frame<'_>, handle: SinkHandle) {
        let read = match self.object.try_borrow() {
            Ok(object) => guarded(|| Ok((self.get)(&*object))),
            Err(_) => {
                debug!(path = %self.path, "Widget object busy, skipping read");
                return;
            }
        };
        let value = match read {
            Ok(value) => {
                self.failing = false;
                value
            }
            Err(e) => {
                if self.failing {
                    debug!(path = %self.path, error = %e, "Widget property still unreadable");
                } else {
                    warn!(path = %self.path, error = %e, "Failed to read widget property");
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
}

impl<W, V: EntryValue> Loggable for Property<W, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn attach(&mut self, parent: Option<&str>) {
        self.path = join_path(parent, &self.name);
    }

    fn init(&mut self, frame: &mut Frame<'_>) {
        if let Some(handle) = self.ensure_published(frame) {
            self.publish_current(frame, handle);
        }
    }

    fn run(&mut self, frame: &mut Frame<'_>) {
        let Some(handle) = self.ensure_published(frame) else {
            return;
        };
        self.apply_edit(frame, handle);
        self.publish_current(frame, handle);
    }

    fn unpublish(&mut self, frame: &mut Frame<'_>) {
        if let SinkState::Published(handle) = self.state {
            frame.close(handle, &self.path);
        }
        self.state = SinkState::Retired;
    }
}

/// Loggable form of a [`Widget`].
pub struct WidgetEntry {
    name: String,
    path: String,
    type_entry: Entry<String>,
    properties: Vec<Box<dyn Loggable>>,
    initialized: bool,
}

impl WidgetEntry {
    pub fn new<W: Widget>(name: impl Into<String>, object: Shared<W>) -> Self {
        Self::with_labels(name, object, BTreeMap::new())
    }

    /// Create a widget whose keys all carry `labels`.
    pub fn with_labels<W: Widget>(
        name: impl Into<String>,
        object: Shared<W>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        let name = name.into();
        let mut props = WidgetProps {
            object,
            labels: labels.clone(),
            properties: Vec::new(),
        };
        W::properties(&mut props);

        let mut entry = Self {
            path: name.clone(),
            name,
            type_entry: Entry::new(WIDGET_TYPE_KEY, || W::WIDGET_TYPE.to_string())
                .with_labels(labels),
            properties: props.properties,
            initialized: false,
        };
        entry.attach(None);
        entry
    }

    pub fn widget_type_path(&self) -> &str {
        self.type_entry.path()
    }
}

impl Loggable for WidgetEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn attach(&mut self, parent: Option<&str>) {
        self.path = join_path(parent, &self.name);
        self.type_entry.attach(Some(&self.path));
        for property in &mut self.properties {
            property.attach(Some(&self.path));
        }
    }

    fn init(&mut self, frame: &mut Frame<'_>) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.type_entry.run(frame);
        for property in &mut self.properties {
            property.init(frame);
        }
    }

    fn run(&mut self, frame: &mut Frame<'_>) {
        self.init(frame);
        for property in &mut self.properties {
            property.run(frame);
        }
    }

    fn unpublish(&mut self, frame: &mut Frame<'_>) {
        self.type_entry.unpublish(frame);
        for property in &mut self.properties {
            property.unpublish(frame);
        }
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        self.type_entry.collect_paths(out);
        for property in &self.properties {
            property.collect_paths(out);
        }
    }

    fn entry_count(&self) -> usize {
        1 + self.properties.len()
    }
}

#[cfg(test)]
mod tests {
    use robolog_common::Value;

    use super::*;
    use crate::frame::{RunMode, Sinks};
    use crate::loggable::shared;

    struct Flywheel {
        target_rpm: f64,
        spinning: bool,
    }

    impl Widget for Flywheel {
        const WIDGET_TYPE: &'static str = "Flywheel";

        fn properties(props: &mut WidgetProps<Self>) {
            props
                .edit("targetRpm", |f| f.target_rpm, |f, v| f.target_rpm = v)
                .read("spinning", |f| f.spinning);
        }
    }

    #[test]
    fn test_init_publishes_everything_eagerly() {
        let (mut sinks, _log) = Sinks::in_memory();
        let flywheel = shared(Flywheel {
            target_rpm: 3500.0,
            spinning: false,
        });
        let mut widget = WidgetEntry::new("shooter", flywheel);

        widget.init(&mut Frame::new(&mut sinks, RunMode::Disabled));

        assert_eq!(
            sinks.live().get_path("shooter/.type"),
            Some(&Value::Text("Flywheel".to_string()))
        );
        assert_eq!(
            sinks.live().get_path("shooter/targetRpm"),
            Some(&Value::Number(3500.0))
        );
        assert!(sinks.live().contains("shooter/spinning"));
        assert_eq!(widget.entry_count(), 3);
    }

    #[test]
    fn test_dashboard_edit_reaches_object() {
        let (mut sinks, _log) = Sinks::in_memory();
        let flywheel = shared(Flywheel {
            target_rpm: 3500.0,
            spinning: true,
        });
        let mut widget = WidgetEntry::new("shooter", Rc::clone(&flywheel));
        widget.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        sinks
            .live_mut()
            .apply_remote("shooter/targetRpm", Value::Number(4000.0))
            .unwrap();
        widget.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert_eq!(flywheel.borrow().target_rpm, 4000.0);
        assert!(sinks.live().writable_paths().eq(["shooter/targetRpm"]));
    }

    struct Gauge {
        readings: Vec<f64>,
    }

    impl Widget for Gauge {
        const WIDGET_TYPE: &'static str = "Gauge";

        fn properties(props: &mut WidgetProps<Self>) {
            props.read("latest", |g| g.readings[g.readings.len() - 1]);
        }
    }

    #[test]
    fn test_panicking_property_keeps_previous_value() {
        let (mut sinks, _log) = Sinks::in_memory();
        let gauge = shared(Gauge {
            readings: vec![1.0],
        });
        let mut widget = WidgetEntry::new("pressure", Rc::clone(&gauge));

        widget.run(&mut Frame::new(&mut sinks, RunMode::Teleop));
        gauge.borrow_mut().readings.clear();
        widget.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert_eq!(
            sinks.live().get_path("pressure/latest"),
            Some(&Value::Number(1.0))
        );
        assert!(gauge.try_borrow_mut().is_ok());
    }

    #[test]
    fn test_labels_reach_every_key() {
        let (mut sinks, _log) = Sinks::in_memory();
        let flywheel = shared(Flywheel {
            target_rpm: 3000.0,
            spinning: false,
        });
        let labels = BTreeMap::from([("subsystem".to_string(), "shooter".to_string())]);
        let mut widget = WidgetEntry::with_labels("shooter", flywheel, labels);
        widget.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        let changes = sinks.live_mut().take_changes();
        let labelled = changes
            .iter()
            .filter_map(|change| match change {
                crate::live::LiveChange::Set(sample) => Some(sample),
                _ => None,
            })
            .filter(|sample| sample.labels.get("subsystem").map(String::as_str) == Some("shooter"))
            .count();
        assert_eq!(labelled, 3);
    }
}
