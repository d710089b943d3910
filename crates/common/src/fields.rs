//! Closed value type for free-form order metadata and event data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered string-keyed bag of values.
pub type Fields = BTreeMap<String, FieldValue>;

/// A single metadata or event data value.
///
/// Serialized untagged, so a `Fields` bag is plain JSON on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Map(Fields),
}

/// Error converting arbitrary JSON into a `FieldValue`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldValueError {
    #[error("null is not a supported field value")]
    Null,

    #[error("arrays are not supported field values")]
    Array,

    #[error("number {0} is out of range")]
    NumberOutOfRange(String),
}

impl FieldValue {
    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Integer(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<Fields> for FieldValue {
    fn from(map: Fields) -> Self {
        FieldValue::Map(map)
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Bool(b) => serde_json::Value::Bool(b),
            FieldValue::Integer(i) => serde_json::Value::from(i),
            FieldValue::Float(f) => serde_json::Value::from(f),
            FieldValue::String(s) => serde_json::Value::String(s),
            FieldValue::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl TryFrom<serde_json::Value> for FieldValue {
    type Error = FieldValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Err(FieldValueError::Null),
            serde_json::Value::Array(_) => Err(FieldValueError::Array),
            serde_json::Value::Bool(b) => Ok(FieldValue::Bool(b)),
            serde_json::Value::String(s) => Ok(FieldValue::String(s)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(FieldValue::Float(f))
                } else {
                    Err(FieldValueError::NumberOutOfRange(n.to_string()))
                }
            }
            serde_json::Value::Object(obj) => {
                let mut map = Fields::new();
                for (k, v) in obj {
                    map.insert(k, FieldValue::try_from(v)?);
                }
                Ok(FieldValue::Map(map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_serialize_as_plain_json() {
        let mut fields = Fields::new();
        fields.insert("email".into(), "a@b.co".into());
        fields.insert("item_count".into(), 3i64.into());

        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"email":"a@b.co","item_count":3}"#);
    }

    #[test]
    fn fields_deserialize_integers_before_floats() {
        let fields: Fields = serde_json::from_str(r#"{"a":1,"b":1.5,"c":true}"#).unwrap();
        assert_eq!(fields["a"], FieldValue::Integer(1));
        assert_eq!(fields["b"], FieldValue::Float(1.5));
        assert_eq!(fields["c"], FieldValue::Bool(true));
    }

    #[test]
    fn nested_maps_roundtrip() {
        let json = serde_json::json!({"source": {"channel": "web", "retry": 2}});
        let value = FieldValue::try_from(json.clone()).unwrap();
        assert!(matches!(value, FieldValue::Map(_)));
        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn null_and_arrays_are_rejected() {
        assert_eq!(
            FieldValue::try_from(serde_json::Value::Null),
            Err(FieldValueError::Null)
        );
        assert_eq!(
            FieldValue::try_from(serde_json::json!([1, 2])),
            Err(FieldValueError::Array)
        );
    }

    #[test]
    fn accessors_return_matching_variant_only() {
        let v = FieldValue::from("x");
        assert_eq!(v.as_str(), Some("x"));
        assert_eq!(v.as_i64(), None);
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
    }
}
