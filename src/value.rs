use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::util::f64_to_i64_safe;
use crate::version::Version;

/// A value represents anything that can be stored as a user property, an event property, a
/// remote config value or a targeting match value.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Stores a string value.
    String(String),
    /// Stores a number.
    Number(f64),
    /// Stores a boolean.
    Bool(bool),
    /// Stores a multi-valued property. Targeting treats it as "any element".
    Array(Vec<Value>),
    /// Stores a null value.
    Null,
}

/// The declared kind of a value, used to pick the comparison a targeting condition performs and
/// the type a remote config caller requires.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Version,
    Json,
    Null,
    #[serde(other)]
    Unknown,
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(i as f64)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Number(f64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(f)
    }
}

impl<T> From<Vec<T>> for Value
where
    Value: From<T>,
{
    fn from(v: Vec<T>) -> Value {
        v.into_iter().collect()
    }
}

impl<T> FromIterator<T> for Value
where
    Value: From<T>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Array(iter.into_iter().map(Value::from).collect())
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_f64() {
                Some(float) => Value::Number(float),
                None => {
                    warn!("could not interpret '{:?}' as f64", n);
                    Value::String(n.to_string())
                }
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(arr) => Value::Array(arr.iter().map(Value::from).collect()),
            // Objects only ever show up as JSON remote config payloads, which are compared as
            // their string form.
            Json::Object(_) => Value::String(v.to_string()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Number(f) => match f64_to_i64_safe(*f) {
                Some(i) if i as f64 == *f => serde_json::Value::from(i),
                _ => serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(serde_json::Value::from).collect())
            }
            Value::Null => serde_json::Value::Null,
        }
    }
}

impl Value {
    /// Returns None unless self is a String. It will not convert.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns None unless self is a Number. It will not convert.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns None unless self is a Bool. It will not convert.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integral value of a number, if it is one. Used for entity ids carried as
    /// targeting values (cohort ids).
    pub fn as_i64(&self) -> Option<i64> {
        let f = self.as_f64()?;
        f64_to_i64_safe(f).filter(|i| *i as f64 == f)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce into a string for string comparison. Numbers are rendered without a trailing `.0`
    /// when integral; booleans and nulls do not coerce.
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(f) => Some(format_number(*f)),
            _ => None,
        }
    }

    /// Coerce into a number for numeric comparison. Numeric strings are parsed; booleans never
    /// convert.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(f) => Some(*f),
            Value::String(s) => s.parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Coerce into a boolean. Only the exact strings "true" and "false" convert.
    pub fn to_boolean(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s == "true" => Some(true),
            Value::String(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    /// Attempt to parse a string value into a version. Non-strings never convert.
    pub fn to_version(&self) -> Option<Version> {
        Version::parse(self.as_str()?)
    }

    /// Find the first value satisfying `p`. Arrays are searched element-wise, nulls never match.
    pub fn find<P>(&self, p: P) -> Option<&Value>
    where
        P: Fn(&Value) -> bool,
    {
        match self {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                if p(self) {
                    Some(self)
                } else {
                    None
                }
            }
            Value::Array(values) => values.iter().find(|v| p(v)),
            Value::Null => None,
        }
    }

    /// Whether this value is an instance of `value_type`, without conversion.
    pub fn is_type_of(&self, value_type: ValueType) -> bool {
        match value_type {
            ValueType::String | ValueType::Json | ValueType::Version => {
                matches!(self, Value::String(_))
            }
            ValueType::Number => matches!(self, Value::Number(_)),
            ValueType::Boolean => matches!(self, Value::Bool(_)),
            ValueType::Null => self.is_null(),
            ValueType::Unknown => false,
        }
    }
}

pub(crate) fn format_number(f: f64) -> String {
    match f64_to_i64_safe(f) {
        Some(i) if i as f64 == f => i.to_string(),
        _ => f.to_string(),
    }
}

/// Shorthand for a property map.
pub type Properties = HashMap<String, Value>;
