//! Raw per-platform records handed over by connectors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::Value;

/// A flat, string-keyed record produced by a platform connector.
///
/// No schema is enforced: the engine only looks for the synonym fields it
/// knows about and ignores everything else. Fields keep the order the
/// connector supplied them in.
///
/// # Examples
///
/// ```
/// use entity_unify::RawRecord;
///
/// let record = RawRecord::new()
///     .with("gid", "task_1")
///     .with("name", "Complete Q3 Report");
/// assert!(record.contains("gid"));
/// assert_eq!(record.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: IndexMap<String, Value>,
}

impl RawRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True when the field is present and not null.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(|v| !v.is_null())
    }

    /// True when any of the given field names is present.
    #[must_use]
    pub fn contains_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.contains(k))
    }

    /// First non-null value among the given field names, in order.
    #[must_use]
    pub fn first_of(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find(|v| !v.is_null())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rejects records carrying a blank field name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fields.keys().any(|k| k.trim().is_empty()) {
            return Err(ValidationError::EmptyFieldName);
        }
        Ok(())
    }

    /// Builds a record from a JSON object.
    ///
    /// # Errors
    /// Returns `RecordNotObject` when `json` is not an object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, ValidationError> {
        let serde_json::Value::Object(map) = json else {
            return Err(ValidationError::RecordNotObject {
                found: json_kind(json),
            });
        };
        Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect())
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Normalizes a platform identifier for table lookups and storage.
#[must_use]
pub fn normalize_platform(platform: &str) -> String {
    platform.trim().to_ascii_lowercase()
}
