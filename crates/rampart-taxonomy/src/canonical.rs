//! Canonical JSON form shared by reconciliation and drift detection.
//!
//! Object keys are sorted at every level and absent optionals serialize as
//! `null`, so two values compare equal exactly when their canonical forms do,
//! independent of field declaration or insertion order.

use serde::Serialize;
use serde_json::{Map, Value};

/// Convert any serializable value to its canonical JSON value.
pub fn canonical_value<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Value> {
    Ok(canonicalize(serde_json::to_value(value)?))
}

/// Canonical compact JSON text.
pub fn canonical_string<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(&canonical_value(value)?)
}

/// Sort object keys recursively.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Blake3 fingerprint of the canonical form, hex encoded.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let text = canonical_string(value)?;
    Ok(hex::encode(blake3::hash(text.as_bytes()).as_bytes()))
}
