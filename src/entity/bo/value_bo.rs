//! values read from or written to devices

use std::fmt::{self, Display, Formatter};
use serde::Serialize;

/// a decoded device value
/// raw reads give `Bool` (bits, channels) or `Int` (registers), adaptors may give anything
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// (value, unit) as returned by a device read
pub type Reading = (Value, Option<String>);

// 2^53, beyond it f64 no longer holds every integer
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

impl Value {
    /// numeric view, booleans count as 0 and 1
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// equality used by mapping adaptors: `true == 1`, `0 == 0.0`
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Text(_), _) | (_, Value::Text(_)) => false,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    /// add a post-adaptor offset, only to numeric values
    /// integers stay integers while the offset is integral and the sum fits
    pub fn with_offset(self, offset: f64) -> Value {
        match self {
            Value::Int(i) if offset.fract() == 0.0 && offset.abs() < MAX_EXACT_INT => match i.checked_add(offset as i64) {
                Some(sum) => Value::Int(sum),
                None => Value::Float(i as f64 + offset),
            },
            Value::Int(i) => Value::Float(i as f64 + offset),
            Value::Float(f) => Value::Float(f + offset),
            other => other,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_eq() {
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(Value::Int(0).loose_eq(&Value::Float(0.0)));
        assert!(!Value::Bool(false).loose_eq(&Value::Text("0".into())));
        assert!(Value::from("open").loose_eq(&Value::from("open")));
    }

    #[test]
    fn test_offset_only_numeric() {
        assert_eq!(Value::Int(100).with_offset(0.0), Value::Int(100));
        assert_eq!(Value::Int(100).with_offset(1.5), Value::Float(101.5));
        assert_eq!(Value::Bool(true).with_offset(1.5), Value::Bool(true));
        assert_eq!(Value::from("open").with_offset(2.0), Value::from("open"));
    }

    #[test]
    fn test_offset_out_of_int_range() {
        assert_eq!(Value::Int(100).with_offset(1e19), Value::Float(100.0 + 1e19));
        assert_eq!(Value::Int(100).with_offset(-1e19), Value::Float(100.0 - 1e19));
        assert_eq!(Value::Int(i64::MAX).with_offset(1.0), Value::Float(i64::MAX as f64 + 1.0));
        assert_eq!(Value::Int(4294967295).with_offset(-1.0), Value::Int(4294967294));
        assert_eq!(Value::Int(1).with_offset(f64::INFINITY), Value::Float(f64::INFINITY));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from_json(&json!(false)), Some(Value::Bool(false)));
        assert_eq!(Value::from_json(&json!(3)), Some(Value::Int(3)));
        assert_eq!(Value::from_json(&json!(2.5)), Some(Value::Float(2.5)));
        assert_eq!(Value::from_json(&json!(null)), None);
    }

    #[test]
    fn test_truthy() {
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }
}
