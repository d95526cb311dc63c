//! Keyed records exchanged between the interpreter and components.

use serde_json::Value;

/// A keyed record of JSON values.
///
/// `serde_json::Map` keeps keys sorted, so serialized records are stable
/// regardless of insertion order.
pub type Record = serde_json::Map<String, Value>;

/// Builds a record with every given field present and set to null.
#[must_use]
pub fn null_record<I, S>(fields: I) -> Record
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields
        .into_iter()
        .map(|field| (field.into(), Value::Null))
        .collect()
}
