//! Attribute values carried by entity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single named fact about an entity, as produced by a fetcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum AttrValue {
    String(String),
    Bool(bool),
    Long(i64),
    Timestamp(DateTime<Utc>),
    /// Raw vendor payload, e.g. a webhook definition.
    Structured(Value),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            AttrValue::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            AttrValue::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// Map a configuration value onto the attribute type it will be compared against.
    ///
    /// Integral numbers become `Long`; anything without a scalar counterpart
    /// (floats, arrays, objects, null) stays `Structured`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => AttrValue::String(s.clone()),
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) if n.is_i64() => AttrValue::Long(n.as_i64().unwrap_or_default()),
            other => AttrValue::Structured(other.clone()),
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::String(s) => write!(f, "{s:?}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Long(n) => write!(f, "{n}"),
            AttrValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            AttrValue::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Long(n)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(t: DateTime<Utc>) -> Self {
        AttrValue::Timestamp(t)
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        AttrValue::Structured(v)
    }
}
