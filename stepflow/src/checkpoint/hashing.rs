//! Canonical serialization and content hashing.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Serializes a value with object keys sorted at every depth.
///
/// Equal values always produce equal text, whatever order their fields
/// were inserted in.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> =
                map.iter().map(|(k, v)| (k, canonical_json(v))).collect();
            let fields: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{v}", Value::String(k.clone())))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
    }
}

/// Computes the checkpoint key for one invocation.
///
/// `namespace` identifies where the call happens: the step's structural
/// path plus the index of every enclosing loop iteration.
#[must_use]
pub fn content_hash(component_id: &str, namespace: &str, inputs: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(component_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(namespace.as_bytes());
    hasher.update([0x1f]);
    hasher.update(canonical_json(inputs).as_bytes());
    hex::encode(hasher.finalize())
}
