//! Per-type dispatch from a member's static type to its entries.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::entry::Entry;
use crate::error::BoxError;
use crate::frame::Tier;
use crate::group::Group;
use crate::loggable::Loggable;
use crate::value::EntryValue;

/// Shared accessor for a member value.
pub type Source<T> = Rc<dyn Fn() -> Result<T, BoxError>>;

/// Tier and labels applied to every entry a leaf produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafOptions {
    pub tier: Tier,
    pub labels: BTreeMap<String, String>,
}

/// A type that knows how to publish itself.
///
/// Scalars and arrays of scalars become a single entry. Composite types
/// such as poses or motor status become a group of entries, each reading
/// one field from the same source.
pub trait Leaf: Sized + 'static {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable>;
}

/// A single entry reading `source` directly.
pub fn scalar_entry<T: EntryValue>(
    name: &str,
    source: Source<T>,
    options: &LeafOptions,
) -> Entry<T> {
    Entry::fallible(name, move || source())
        .with_tier(options.tier)
        .with_labels(options.labels.clone())
}

/// An entry reading one field of `source`.
pub fn field_entry<T: 'static, V: EntryValue>(
    source: &Source<T>,
    name: &str,
    options: &LeafOptions,
    project: impl Fn(&T) -> V + 'static,
) -> Entry<V> {
    let source = Rc::clone(source);
    Entry::fallible(name, move || source().map(|value| project(&value)))
        .with_tier(options.tier)
        .with_labels(options.labels.clone())
}

/// Builder for composite leaves.
pub struct LeafGroup<T> {
    source: Source<T>,
    options: LeafOptions,
    group: Group,
}

impl<T: 'static> LeafGroup<T> {
    pub fn new(name: &str, source: Source<T>, options: &LeafOptions) -> Self {
        Self {
            source,
            options: options.clone(),
            group: Group::new(name),
        }
    }

    /// Add an entry for one field.
    pub fn field<V: EntryValue>(mut self, name: &str, project: impl Fn(&T) -> V + 'static) -> Self {
        self.group
            .add(field_entry(&self.source, name, &self.options, project));
        self
    }

    /// Add a nested composite built from one field.
    pub fn nested<V: Leaf>(mut self, name: &str, project: impl Fn(&T) -> V + 'static) -> Self {
        let source = Rc::clone(&self.source);
        let nested: Source<V> = Rc::new(move || source().map(|value| project(&value)));
        self.group
            .add_boxed(V::loggable(name, nested, &self.options));
        self
    }

    pub fn build(self) -> Box<dyn Loggable> {
        Box::new(self.group)
    }
}

macro_rules! scalar_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Leaf for $ty {
                fn loggable(
                    name: &str,
                    source: Source<Self>,
                    options: &LeafOptions,
                ) -> Box<dyn Loggable> {
                    Box::new(scalar_entry(name, source, options))
                }
            }
        )*
    };
}

scalar_leaf!(
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    Vec<bool>,
    Vec<i16>,
    Vec<i32>,
    Vec<i64>,
    Vec<u16>,
    Vec<u32>,
    Vec<u64>,
    Vec<f32>,
    Vec<f64>,
    Vec<String>,
);

#[cfg(test)]
mod tests {
    use robolog_common::Value;

    use super::*;
    use crate::frame::{Frame, RunMode, Sinks};

    #[derive(Clone)]
    struct Wheel {
        rpm: f64,
        slipping: bool,
    }

    #[test]
    fn test_scalar_leaf_is_one_entry() {
        let source: Source<i32> = Rc::new(|| Ok(7));
        let loggable = i32::loggable("count", source, &LeafOptions::default());
        assert_eq!(loggable.entry_count(), 1);
        assert_eq!(loggable.path(), "count");
    }

    #[test]
    fn test_leaf_group_reads_fields() {
        let (mut sinks, _log) = Sinks::in_memory();
        let source: Source<Wheel> = Rc::new(|| {
            Ok(Wheel {
                rpm: 1200.0,
                slipping: true,
            })
        });
        let mut loggable = LeafGroup::new("wheel", source, &LeafOptions::default())
            .field("rpm", |w| w.rpm)
            .field("slipping", |w| w.slipping)
            .build();

        loggable.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert_eq!(sinks.live().get_path("wheel/rpm"), Some(&Value::Number(1200.0)));
        assert_eq!(sinks.live().get_path("wheel/slipping"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_options_apply_to_every_field() {
        let (mut sinks, log) = Sinks::in_memory();
        let source: Source<Wheel> = Rc::new(|| {
            Ok(Wheel {
                rpm: 10.0,
                slipping: false,
            })
        });
        let options = LeafOptions {
            tier: Tier::Durable,
            labels: BTreeMap::new(),
        };
        let mut loggable = LeafGroup::new("wheel", source, &options)
            .field("rpm", |w| w.rpm)
            .build();

        loggable.run(&mut Frame::new(&mut sinks, RunMode::Teleop));

        assert!(!sinks.live().contains("wheel/rpm"));
        assert_eq!(log.values_for("wheel/rpm"), vec![Value::Number(10.0)]);
    }
}
