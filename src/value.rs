//! Scalar values carried by raw records and entity attributes.
//!
//! Platform connectors hand over flat records whose values are strings,
//! numbers or booleans. Values serialize untagged so that a record round-trips
//! through the same JSON shape the connector produced.

use serde::{Deserialize, Serialize};

/// A scalar field value.
///
/// # Examples
///
/// ```
/// use entity_unify::Value;
///
/// let name = Value::from("Acme Inc");
/// let amount = Value::from(50_000);
///
/// assert!(name.is_string());
/// assert_eq!(amount.as_float(), Some(50_000.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Finite numeric view of the value.
    ///
    /// Numeric strings (`"50000"`, `"1,250.50"`) are accepted because CRMs
    /// commonly export amounts as text. `NaN` and infinities are rejected.
    pub fn as_float(&self) -> Option<f64> {
        let v = match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
            Self::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the string content if this is a non-blank string.
    pub fn as_non_empty_str(&self) -> Option<&str> {
        self.as_str().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Converts a JSON value into a scalar.
    ///
    /// Arrays and objects are kept as their compact JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s.clone()),
            nested => Self::String(nested.to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_string() {
        let val = Value::from("hello");
        assert!(val.is_string());
        assert_eq!(val.as_str(), Some("hello"));
        assert_eq!(val.type_name(), "string");
    }

    #[test]
    fn test_value_numeric_views() {
        assert_eq!(Value::Int(42).as_float(), Some(42.0));
        assert_eq!(Value::from("1,250.50").as_float(), Some(1250.5));
        assert_eq!(Value::from("n/a").as_float(), None);
        assert_eq!(Value::Bool(true).as_float(), None);
        assert_eq!(Value::from("NaN").as_float(), None);
        assert_eq!(Value::from("inf").as_float(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_float(), None);
    }

    #[test]
    fn test_value_non_empty_str() {
        assert_eq!(Value::from("  Acme ").as_non_empty_str(), Some("Acme"));
        assert_eq!(Value::from("   ").as_non_empty_str(), None);
        assert_eq!(Value::Int(1).as_non_empty_str(), None);
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(Value::from_json(&serde_json::json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(&serde_json::json!(2.5)), Value::Float(2.5));
        assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);
        assert_eq!(
            Value::from_json(&serde_json::json!(["a", "b"])),
            Value::String("[\"a\",\"b\"]".to_string())
        );
    }

    #[test]
    fn test_value_untagged_serialization() {
        let json = serde_json::to_string(&Value::from("test")).unwrap();
        assert_eq!(json, "\"test\"");
        let back: Value = serde_json::from_str("12").unwrap();
        assert_eq!(back, Value::Int(12));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::from("hi")), "hi");
        assert_eq!(format!("{}", Value::Null), "null");
    }
}
