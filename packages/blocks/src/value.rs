//! # Attribute Values
//!
//! Block attributes are an open string-keyed map, but every value is one of
//! a closed set of shapes. Integers and floats are kept apart so that a
//! document survives a JSON round trip unchanged (`2` stays `2`, `2.0`
//! stays `2.0`). Integers above `i64::MAX` are kept as unsigned rather than
//! widened to a float.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    UInt(u64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read the value as an integer.
    ///
    /// Settings forms hand numbers back as strings or floats, so integral
    /// floats and numeric strings are accepted as well.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Map(map) => write!(f, "{{{} keys}}", map.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_and_floats_stay_distinct() {
        let parsed: Vec<Value> = serde_json::from_str("[2, 2.0, 2.5, -7]").unwrap();
        assert_eq!(
            parsed,
            vec![
                Value::Integer(2),
                Value::Float(2.0),
                Value::Float(2.5),
                Value::Integer(-7)
            ]
        );

        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, "[2,2.0,2.5,-7]");
    }

    #[test]
    fn test_large_unsigned_survives_round_trip() {
        let json = r#"{"big":18446744073709551615}"#;

        let parsed: Value = serde_json::from_str(json).unwrap();
        let Value::Map(map) = &parsed else {
            panic!("expected map");
        };
        assert_eq!(map["big"], Value::UInt(u64::MAX));
        assert_eq!(map["big"].as_integer(), None);
        assert_eq!(map["big"].kind_name(), "integer");
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);

        let converted = Value::from(serde_json::json!({"big": u64::MAX}));
        assert_eq!(converted, parsed);
    }

    #[test]
    fn test_nested_values_parse() {
        let parsed: Value =
            serde_json::from_str(r#"{"a": [true, null, "x"], "b": {"c": 1}}"#).unwrap();

        let Value::Map(map) = parsed else {
            panic!("expected map");
        };
        assert_eq!(
            map["a"],
            Value::List(vec![Value::Bool(true), Value::Null, Value::from("x")])
        );
        assert_eq!(map["b"], Value::Map([("c".to_string(), Value::Integer(1))].into()));
    }

    #[test]
    fn test_lenient_integer_reading() {
        assert_eq!(Value::Integer(3).as_integer(), Some(3));
        assert_eq!(Value::Float(4.0).as_integer(), Some(4));
        assert_eq!(Value::Float(4.5).as_integer(), None);
        assert_eq!(Value::from(" 5 ").as_integer(), Some(5));
        assert_eq!(Value::from("five").as_integer(), None);
        assert_eq!(Value::Bool(true).as_integer(), None);
    }

    #[test]
    fn test_from_json_value() {
        let json = serde_json::json!({"n": 1, "f": 1.5, "s": "hi"});
        let value = Value::from(json);
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["n"], Value::Integer(1));
        assert_eq!(map["f"], Value::Float(1.5));
        assert_eq!(map["s"], Value::from("hi"));
    }
}
