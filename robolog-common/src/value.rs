use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// A value published under one telemetry key.
///
/// The encoding is untagged, so a decoder infers the variant from the data:
/// - An empty array always decodes as [`Value::BooleanArray`]. Readers that
///   need the original variant take it from the key's [`ValueKind`]
///   (advertised when the key is published) and call [`Value::with_kind`].
/// - JSON has no NaN or infinity. Non-finite numbers are written as `null`
///   and decode as NaN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag.
    Boolean(bool),

    /// Signed integer.
    Integer(i64),

    /// Floating point number.
    Number(#[serde(deserialize_with = "number_or_nan")] f64),

    /// Text value.
    Text(String),

    /// Array of booleans.
    BooleanArray(Vec<bool>),

    /// Array of integers.
    IntegerArray(Vec<i64>),

    /// Array of numbers.
    NumberArray(#[serde(deserialize_with = "numbers_or_nan")] Vec<f64>),

    /// Array of strings.
    TextArray(Vec<String>),
}

impl Value {
    /// Get the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::BooleanArray(_) => ValueKind::BooleanArray,
            Value::IntegerArray(_) => ValueKind::IntegerArray,
            Value::NumberArray(_) => ValueKind::NumberArray,
            Value::TextArray(_) => ValueKind::TextArray,
        }
    }

    /// Interpret this value as a number, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Reinterpret an empty array as the array variant of `kind`.
    ///
    /// Any other value is returned unchanged.
    pub fn with_kind(self, kind: ValueKind) -> Self {
        let empty = match &self {
            Value::BooleanArray(v) => v.is_empty(),
            Value::IntegerArray(v) => v.is_empty(),
            Value::NumberArray(v) => v.is_empty(),
            Value::TextArray(v) => v.is_empty(),
            _ => false,
        };
        if !empty {
            return self;
        }
        match kind {
            ValueKind::BooleanArray => Value::BooleanArray(Vec::new()),
            ValueKind::IntegerArray => Value::IntegerArray(Vec::new()),
            ValueKind::NumberArray => Value::NumberArray(Vec::new()),
            ValueKind::TextArray => Value::TextArray(Vec::new()),
            _ => self,
        }
    }

    /// Interpret this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::NumberArray(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextArray(v)
    }
}

fn number_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn numbers_or_nan<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(items.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Shape of a published value, fixed when a key is first published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Integer,
    Number,
    Text,
    BooleanArray,
    IntegerArray,
    NumberArray,
    TextArray,
}

impl ValueKind {
    /// Get the type name advertised to dashboards.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "int",
            ValueKind::Number => "double",
            ValueKind::Text => "string",
            ValueKind::BooleanArray => "boolean[]",
            ValueKind::IntegerArray => "int[]",
            ValueKind::NumberArray => "double[]",
            ValueKind::TextArray => "string[]",
        }
    }

    /// Whether values of this kind can be overridden from outside the process.
    pub fn is_tunable(&self) -> bool {
        matches!(
            self,
            ValueKind::Boolean | ValueKind::Integer | ValueKind::Number
        )
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One change of a live key, as seen by exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSample {
    /// Unix epoch milliseconds when the change was recorded.
    pub timestamp: i64,

    /// Full entry path (without the bus prefix), e.g. "drivetrain/leftMotor/temperature".
    pub path: String,

    /// The new value.
    pub value: Value,

    /// Grouping tags accumulated during discovery.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl LiveSample {
    /// Create a new sample with the current timestamp.
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            path: path.into(),
            value,
            labels: BTreeMap::new(),
        }
    }

    /// Add a label to this sample.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_sample_creation() {
        let sample = LiveSample::new("drivetrain/leftMotor/temperature", Value::Number(41.5))
            .with_label("tag", "drive");

        assert_eq!(sample.path, "drivetrain/leftMotor/temperature");
        assert_eq!(sample.value, Value::Number(41.5));
        assert_eq!(sample.labels.get("tag"), Some(&"drive".to_string()));
        assert!(sample.timestamp > 0);
    }

    #[test]
    fn test_value_kind_names() {
        assert_eq!(Value::Boolean(true).kind().as_str(), "boolean");
        assert_eq!(Value::NumberArray(vec![1.0]).kind().as_str(), "double[]");
        assert_eq!(format!("{}", ValueKind::TextArray), "string[]");
    }

    #[test]
    fn test_untagged_json_shapes() {
        let v: Value = serde_json::from_str("7.5").unwrap();
        assert_eq!(v, Value::Number(7.5));

        let v: Value = serde_json::from_str("7").unwrap();
        assert_eq!(v, Value::Integer(7));
        assert_eq!(v.as_f64(), Some(7.0));

        let v: Value = serde_json::from_str("[\"a\", \"b\"]").unwrap();
        assert_eq!(v, Value::TextArray(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_non_finite_numbers_read_back_from_json() {
        let json = serde_json::to_string(&Value::Number(f64::NAN)).unwrap();
        assert_eq!(json, "null");
        let v: Value = serde_json::from_str(&json).unwrap();
        assert!(matches!(v, Value::Number(n) if n.is_nan()));

        let json = serde_json::to_string(&Value::NumberArray(vec![1.5, f64::INFINITY])).unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        match v {
            Value::NumberArray(items) => {
                assert_eq!(items[0], 1.5);
                assert!(items[1].is_nan());
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_empty_array_kind_restored() {
        let json = serde_json::to_string(&Value::TextArray(Vec::new())).unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, Value::BooleanArray(Vec::new()));
        assert_eq!(
            v.with_kind(ValueKind::TextArray),
            Value::TextArray(Vec::new())
        );

        let full = Value::BooleanArray(vec![true]);
        assert_eq!(full.clone().with_kind(ValueKind::TextArray), full);
        assert_eq!(
            Value::Number(1.0).with_kind(ValueKind::TextArray),
            Value::Number(1.0)
        );
    }

    #[test]
    fn test_tunable_kinds() {
        assert!(ValueKind::Number.is_tunable());
        assert!(ValueKind::Boolean.is_tunable());
        assert!(!ValueKind::Text.is_tunable());
        assert!(!ValueKind::NumberArray.is_tunable());
    }
}
