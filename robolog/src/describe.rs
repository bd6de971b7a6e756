//! Declarative discovery of an object's telemetry.
//!
//! A type implements [`Describe`] by listing its members on a [`Fields`]
//! registrar. [`discover`] walks a root object through those descriptions
//! and builds the [`Group`] tree, probing every member once: a member that
//! cannot be read (an error, a busy borrow or a panic) is logged and left
//! out, and the walk carries on.
//!
//! ```ignore
//! struct Drivetrain {
//!     left_motor: Shared<MotorController>,
//!     heading: f64,
//! }
//!
//! impl Describe for Drivetrain {
//!     fn describe(fields: &mut Fields<'_, Self>) {
//!         fields
//!             .log("heading", |d| d.heading)
//!             .nested("leftMotor", |d| d.left_motor.clone());
//!     }
//! }
//!
//! let group = discover("drivetrain", &drivetrain);
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::rc::Rc;

use robolog_common::{join_path, validate_segment};
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::{BoxError, TelemetryError, guarded};
use crate::frame::Tier;
use crate::group::Group;
use crate::leaf::{Leaf, LeafOptions, Source};
use crate::loggable::{Loggable, Shared};
use crate::tunable::Tunable;
use crate::value::EntryValue;
use crate::widget::{Widget, WidgetEntry};

/// Nesting depth at which discovery stops descending.
pub const MAX_DEPTH: usize = 32;

/// A type whose members can be discovered.
pub trait Describe: 'static {
    fn describe(fields: &mut Fields<'_, Self>)
    where
        Self: Sized;
}

/// Name, tier and tags of one member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    name: String,
    tier: Tier,
    tags: BTreeMap<String, String>,
}

impl LogOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Attach a grouping tag, inherited by nested members.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for LogOptions {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LogOptions {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Member registrar for one object.
pub struct Fields<'g, T> {
    object: Shared<T>,
    group: &'g mut Group,
    tags: BTreeMap<String, String>,
    depth: usize,
}

impl<T: 'static> Fields<'_, T> {
    /// Log a member through its [`Leaf`] implementation.
    pub fn log<V: Leaf>(
        &mut self,
        options: impl Into<LogOptions>,
        get: impl Fn(&T) -> V + 'static,
    ) -> &mut Self {
        self.try_log(options, move |object| Ok(get(object)))
    }

    /// Log a member whose read may fail.
    pub fn try_log<V: Leaf>(
        &mut self,
        options: impl Into<LogOptions>,
        get: impl Fn(&T) -> Result<V, BoxError> + 'static,
    ) -> &mut Self {
        let options = options.into();
        let Some(source) = self.probe(&options.name, get) else {
            return self;
        };
        let leaf_options = self.leaf_options(&options);
        self.group
            .add_boxed(V::loggable(&options.name, source, &leaf_options));
        self
    }

    /// Log any displayable member as text.
    pub fn text<V: Display>(
        &mut self,
        options: impl Into<LogOptions>,
        get: impl Fn(&T) -> V + 'static,
    ) -> &mut Self {
        let options = options.into();
        let Some(source) = self.probe(&options.name, move |object| Ok(get(object).to_string()))
        else {
            return self;
        };
        let leaf_options = self.leaf_options(&options);
        self.group
            .add(Entry::fallible(options.name.clone(), move || source())
                .with_tier(leaf_options.tier)
                .with_labels(leaf_options.labels));
        self
    }

    /// Recurse into a member that is itself [`Describe`].
    ///
    /// The child handle is captured now; replacing the member later does
    /// not redirect the published entries.
    pub fn nested<C: Describe>(
        &mut self,
        options: impl Into<LogOptions>,
        get: impl Fn(&T) -> Shared<C>,
    ) -> &mut Self {
        self.try_nested(options, move |object| Ok(get(object)))
    }

    /// Recurse into a member whose handle may be unavailable.
    pub fn try_nested<C: Describe>(
        &mut self,
        options: impl Into<LogOptions>,
        get: impl Fn(&T) -> Result<Shared<C>, BoxError>,
    ) -> &mut Self {
        let options = options.into();
        let path = join_path(Some(self.group.path()), &options.name);

        if self.depth + 1 >= MAX_DEPTH {
            warn!(member = %path, error = %TelemetryError::TooDeep(path.clone()), "Skipping member");
            return self;
        }

        let Some(child) = self.read_once(&options.name, get) else {
            return self;
        };

        let mut tags = self.tags.clone();
        tags.extend(options.tags);
        let group = describe_into(&options.name, child, tags, self.depth + 1);
        self.group.add(group);
        self
    }

    /// Expose a numeric or boolean member as a tunable.
    ///
    /// Test-mode overrides and the later reset are applied through `set`.
    pub fn tunable<V: EntryValue + Copy>(
        &mut self,
        options: impl Into<LogOptions>,
        get: impl Fn(&T) -> V,
        set: impl Fn(&mut T, V) + 'static,
    ) -> &mut Self {
        let options = options.into();
        let Some(initial) = self.read_once(&options.name, move |object| Ok(get(object))) else {
            return self;
        };

        let object = Rc::clone(&self.object);
        let path = join_path(Some(self.group.path()), &options.name);
        let callback = move |value: &V| match object.try_borrow_mut() {
            Ok(mut object) => set(&mut *object, *value),
            Err(_) => warn!(path = %path, "Object busy, tunable value not applied"),
        };

        match Tunable::new(options.name.clone(), initial, callback) {
            Ok(tunable) => {
                let labels = self.leaf_options(&options).labels;
                self.group.add(tunable.with_labels(labels));
            }
            Err(e) => warn!(member = %options.name, error = %e, "Skipping member"),
        }
        self
    }

    /// Publish a member through its [`Widget`] representation.
    pub fn widget<W: Widget>(
        &mut self,
        options: impl Into<LogOptions>,
        get: impl Fn(&T) -> Shared<W>,
    ) -> &mut Self {
        let options = options.into();
        let Some(widget) = self.read_once(&options.name, move |object| Ok(get(object))) else {
            return self;
        };
        let labels = self.leaf_options(&options).labels;
        self.group
            .add(WidgetEntry::with_labels(options.name, widget, labels));
        self
    }

    /// Add a hand-built loggable.
    pub fn add(&mut self, loggable: impl Loggable + 'static) -> &mut Self {
        if let Err(e) = validate_segment(loggable.name()) {
            warn!(member = %loggable.name(), error = %e, "Skipping member");
            return self;
        }
        self.group.add(loggable);
        self
    }

    /// The object being described.
    pub fn object(&self) -> &Shared<T> {
        &self.object
    }

    fn leaf_options(&self, options: &LogOptions) -> LeafOptions {
        let mut labels = self.tags.clone();
        labels.extend(options.tags.clone());
        LeafOptions {
            tier: options.tier,
            labels,
        }
    }

    /// Build a reusable source for a member and read it once.
    fn probe<V: 'static>(
        &self,
        name: &str,
        get: impl Fn(&T) -> Result<V, BoxError> + 'static,
    ) -> Option<Source<V>> {
        if !self.valid_name(name) {
            return None;
        }

        let object = Rc::clone(&self.object);
        let path = join_path(Some(self.group.path()), name);
        let source: Source<V> = Rc::new(move || -> Result<V, BoxError> {
            let object = object
                .try_borrow()
                .map_err(|_| TelemetryError::Busy(path.clone()))?;
            get(&*object)
        });

        match guarded(|| source()) {
            Ok(_) => Some(source),
            Err(e) => {
                self.skip(name, e);
                None
            }
        }
    }

    /// Read a member a single time.
    fn read_once<V>(
        &self,
        name: &str,
        get: impl FnOnce(&T) -> Result<V, BoxError>,
    ) -> Option<V> {
        if !self.valid_name(name) {
            return None;
        }

        let path = join_path(Some(self.group.path()), name);
        let result = match self.object.try_borrow() {
            Ok(object) => guarded(|| get(&*object)),
            Err(_) => Err(TelemetryError::Busy(path).into()),
        };

        result.map_err(|e| self.skip(name, e)).ok()
    }

    fn valid_name(&self, name: &str) -> bool {
        match validate_segment(name) {
            Ok(()) => true,
            Err(e) => {
                let error = TelemetryError::InvalidName(e.to_string());
                warn!(group = %self.group.path(), member = %name, error = %error, "Skipping member");
                false
            }
        }
    }

    fn skip(&self, name: &str, error: BoxError) {
        let path = join_path(Some(self.group.path()), name);
        let error = TelemetryError::read(path.clone(), error);
        warn!(member = %path, error = %error, "Skipping member");
    }
}

fn describe_into<T: Describe>(
    name: &str,
    object: Shared<T>,
    tags: BTreeMap<String, String>,
    depth: usize,
) -> Group {
    let mut group = Group::new(name);
    {
        let mut fields = Fields {
            object,
            group: &mut group,
            tags,
            depth,
        };
        T::describe(&mut fields);
    }
    debug!(group = %group.path(), entries = group.entry_count(), "Discovered group");
    group
}

/// Walk `root` through its [`Describe`] implementation.
pub fn discover<T: Describe>(name: &str, root: &Shared<T>) -> Group {
    describe_into(name, Rc::clone(root), BTreeMap::new(), 0)
}
