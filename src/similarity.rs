//! Similarity scoring between entities.
//!
//! Both scorers are pure and return a value in `[0.0, 1.0]`.

use std::collections::{BTreeMap, HashSet};

use crate::value::Value;

/// Attribute keys that describe bookkeeping rather than identity.
const IGNORED_KEYS: &[&str] = &["created_at", "updated_at"];

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Name similarity.
///
/// - case/whitespace-insensitive equality: `1.0`
/// - one name contains the other: `0.8`
/// - otherwise token-set Jaccard similarity (`0.0` for empty token sets)
///
/// # Examples
///
/// ```
/// use entity_unify::similarity::name_similarity;
///
/// assert_eq!(name_similarity("Acme  Inc", "acme inc"), 1.0);
/// assert_eq!(name_similarity("Acme", "Acme Inc"), 0.8);
/// assert_eq!(name_similarity("John Smith", "John Doe"), 1.0 / 3.0);
/// ```
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return 1.0;
    }
    if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
        return 0.8;
    }

    let ta: HashSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let tb: HashSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    let union = ta.union(&tb).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    intersection as f64 / union as f64
}

fn value_similarity(a: &Value, b: &Value) -> f64 {
    if a == b {
        return 1.0;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => name_similarity(x, y),
        _ => 0.0,
    }
}

/// Mean per-key similarity over the attribute keys both maps share.
///
/// `created_at`/`updated_at` are ignored. Returns `0.0` when no keys are
/// shared.
#[must_use]
pub fn attribute_similarity(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> f64 {
    let scores: Vec<f64> = a
        .iter()
        .filter(|(k, _)| !IGNORED_KEYS.contains(&k.as_str()))
        .filter_map(|(k, va)| b.get(k).map(|vb| value_similarity(va, vb)))
        .collect();

    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Combined score used by entity resolution.
#[must_use]
pub fn overall_similarity(
    name_a: &str,
    attrs_a: &BTreeMap<String, Value>,
    name_b: &str,
    attrs_b: &BTreeMap<String, Value>,
) -> f64 {
    (name_similarity(name_a, name_b) + attribute_similarity(attrs_a, attrs_b)) / 2.0
}
