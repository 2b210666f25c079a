//! Tagged scalar for untyped source property values

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Record properties keyed by name, in the order the source sent them.
pub type Properties = IndexMap<String, Scalar>;

/// A property value as delivered by the source, classified once on parse.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// Arrays, objects, and integers outside `i64`
    Other(Value),
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::String(s),
            Value::Bool(b) => Self::Bool(b),
            Value::Null => Self::Null,
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if n.is_f64() {
                    n.as_f64().map_or(Self::Null, Self::Float)
                } else {
                    // u64 beyond i64::MAX
                    Self::Other(Value::Number(n))
                }
            }
            other => Self::Other(other),
        }
    }
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render as text, for STRING columns.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null => None,
            Self::Other(v) => Some(v.to_string()),
        }
    }

    /// Interpret as integer, for INT64 columns. Integral strings are parsed.
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as float, for FLOAT64 columns. Ints widen, numeric strings parse.
    pub fn to_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::String(s) => s.trim().parse().ok().filter(|f: &f64| f.is_finite()),
            _ => None,
        }
    }
}
