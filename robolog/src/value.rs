//! Conversion between Rust values and published [`Value`]s.

use robolog_common::{Value, ValueKind};

/// A Rust type that can be published by a single entry.
///
/// [`EntryValue::same`] decides change suppression: a value the same as the
/// previously written one is not written again.
pub trait EntryValue: Clone + PartialEq + 'static {
    /// Kind advertised when the entry is published.
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    /// Convert back from a value found in the live table.
    fn from_value(value: &Value) -> Option<Self>;

    /// Whether `other` needs no new write after `self`.
    ///
    /// Floating point values compare with `total_cmp`, so NaN is the same
    /// as NaN.
    fn same(&self, other: &Self) -> bool {
        self == other
    }
}

impl EntryValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! integer_entry_value {
    ($($ty:ty),*) => {
        $(
            impl EntryValue for $ty {
                const KIND: ValueKind = ValueKind::Integer;

                fn to_value(&self) -> Value {
                    Value::Integer(i64::try_from(*self).unwrap_or(i64::MAX))
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Integer(v) => <$ty>::try_from(*v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

integer_entry_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl EntryValue for f64 {
    const KIND: ValueKind = ValueKind::Number;

    fn to_value(&self) -> Value {
        Value::Number(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
    fn same(&self, other: &Self) -> bool {
        self.total_cmp(other).is_eq()
    }
}

impl EntryValue for f32 {
    const KIND: ValueKind = ValueKind::Number;

    fn to_value(&self) -> Value {
        Value::Number(f64::from(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
    fn same(&self, other: &Self) -> bool {
        self.total_cmp(other).is_eq()
    }
}

impl EntryValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl EntryValue for Vec<bool> {
    const KIND: ValueKind = ValueKind::BooleanArray;

    fn to_value(&self) -> Value {
        Value::BooleanArray(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanArray(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl EntryValue for Vec<String> {
    const KIND: ValueKind = ValueKind::TextArray;

    fn to_value(&self) -> Value {
        Value::TextArray(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::TextArray(v) => Some(v.clone()),
            _ => None,
        }
    }
}

macro_rules! integer_array_entry_value {
    ($($ty:ty),*) => {
        $(
            impl EntryValue for Vec<$ty> {
                const KIND: ValueKind = ValueKind::IntegerArray;

                fn to_value(&self) -> Value {
                    Value::IntegerArray(
                        self.iter()
                            .map(|v| i64::try_from(*v).unwrap_or(i64::MAX))
                            .collect(),
                    )
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::IntegerArray(v) => {
                            v.iter().map(|item| <$ty>::try_from(*item).ok()).collect()
                        }
                        _ => None,
                    }
                }
            }
        )*
    };
}

integer_array_entry_value!(i16, i32, i64, u16, u32, u64);

impl EntryValue for Vec<f64> {
    const KIND: ValueKind = ValueKind::NumberArray;

    fn to_value(&self) -> Value {
        Value::NumberArray(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::NumberArray(v) => Some(v.clone()),
            Value::IntegerArray(v) => Some(v.iter().map(|i| *i as f64).collect()),
            _ => None,
        }
    }
    fn same(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same(b))
    }
}

impl EntryValue for Vec<f32> {
    const KIND: ValueKind = ValueKind::NumberArray;

    fn to_value(&self) -> Value {
        Value::NumberArray(self.iter().map(|v| f64::from(*v)).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        Vec::<f64>::from_value(value).map(|v| v.into_iter().map(|x| x as f32).collect())
    }
    fn same(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same(b))
    }
}
