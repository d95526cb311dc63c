//! Declared value types for inputs, config and outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Any value.
    #[default]
    Any,
    /// A string.
    String,
    /// A filesystem path, carried as a string.
    Path,
    /// An integer.
    Integer,
    /// Any number.
    Number,
    /// A boolean.
    Boolean,
    /// An ordered sequence.
    #[serde(alias = "array")]
    List,
    /// A keyed record.
    #[serde(alias = "dict", alias = "object")]
    Record,
}

impl ValueType {
    /// Returns true if the value has this type. Null is never accepted
    /// except by [`ValueType::Any`].
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String | Self::Path => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Record => value.is_object(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::String => write!(f, "string"),
            Self::Path => write!(f, "path"),
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::List => write!(f, "list"),
            Self::Record => write!(f, "record"),
        }
    }
}
