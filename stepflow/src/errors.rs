//! Error types for flow execution.
//!
//! Resolution and loop-structure errors are fatal to a run and never pass
//! through an error policy. Only [`FlowError::ComponentInvocation`] is the
//! product of a policy decision.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::core::Record;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlowError>;

/// The main error type for flow operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A reference named a binding or field that does not exist.
    #[error("unresolved reference '{name}' in {{{path}}}")]
    UnresolvedReference {
        /// The first path element that could not be found.
        name: String,
        /// The full reference path as written.
        path: String,
    },

    /// A path tried to index into a value of the wrong shape.
    #[error("type mismatch at {{{path}}}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The reference path being resolved.
        path: String,
        /// The shape the path required.
        expected: String,
        /// The shape actually held.
        found: String,
    },

    /// A loop source did not resolve to a sequence.
    #[error("loop source '{expression}' is not a sequence (found {found})")]
    InvalidIterable {
        /// The loop source expression.
        expression: String,
        /// The shape actually held.
        found: String,
    },

    /// A component failed and its error policy did not recover.
    #[error("component '{component_id}' failed at {step} after {attempts} attempt(s): {source}")]
    ComponentInvocation {
        /// Structural path of the failing step.
        step: String,
        /// The failing component id.
        component_id: String,
        /// The resolved inputs of the failing call.
        inputs: Record,
        /// Number of attempts made.
        attempts: u32,
        /// The component-reported cause.
        #[source]
        source: ComponentError,
    },

    /// An accumulator was read before its sink step ran.
    #[error("accumulator '{component_id}' was read before it was finalized")]
    NotFinalized {
        /// The accumulator component id.
        component_id: String,
    },

    /// A step referenced a component id with no instance.
    #[error("unknown component id '{0}'")]
    UnknownComponent(String),

    /// A component declared a type the registry does not know.
    #[error("unknown component type '{type_name}' for component '{component_id}'")]
    UnknownComponentType {
        /// The declaring component id.
        component_id: String,
        /// The unknown type name.
        type_name: String,
    },

    /// A component type was registered twice.
    #[error("component type '{0}' is already registered")]
    DuplicateComponentType(String),

    /// A required flow input was neither provided nor defaulted.
    #[error("missing required input '{0}'")]
    MissingInput(String),

    /// A flow input value did not match its declared type.
    #[error("invalid input '{name}': {message}")]
    InvalidInput {
        /// The input name.
        name: String,
        /// What was wrong with it.
        message: String,
    },

    /// The flow program failed structural validation.
    #[error("{0}")]
    Validation(#[from] FlowValidationError),

    /// The run was cancelled.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// The checkpoint log failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Creates an unresolved reference error.
    #[must_use]
    pub fn unresolved(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: &Value,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            found: value_kind(found).to_string(),
        }
    }

    /// Returns a stable name for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnresolvedReference { .. } => "unresolved_reference",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::InvalidIterable { .. } => "invalid_iterable",
            Self::ComponentInvocation { .. } => "component_invocation",
            Self::NotFinalized { .. } => "not_finalized",
            Self::UnknownComponent(_) => "unknown_component",
            Self::UnknownComponentType { .. } => "unknown_component_type",
            Self::DuplicateComponentType(_) => "duplicate_component_type",
            Self::MissingInput(_) => "missing_input",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Validation(_) => "validation",
            Self::Cancelled(_) => "cancelled",
            Self::Checkpoint(_) => "checkpoint",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }

    /// Returns true for errors that indicate a malformed program rather
    /// than a failing component.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. }
                | Self::TypeMismatch { .. }
                | Self::InvalidIterable { .. }
                | Self::NotFinalized { .. }
                | Self::UnknownComponent(_)
        )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), Value::String(self.kind().to_string()));
        map.insert("message".to_string(), Value::String(self.to_string()));
        match self {
            Self::UnresolvedReference { name, path } => {
                map.insert("name".to_string(), Value::String(name.clone()));
                map.insert("path".to_string(), Value::String(path.clone()));
            }
            Self::ComponentInvocation {
                step,
                component_id,
                inputs,
                attempts,
                ..
            } => {
                map.insert("step".to_string(), Value::String(step.clone()));
                map.insert(
                    "component_id".to_string(),
                    Value::String(component_id.clone()),
                );
                map.insert("inputs".to_string(), Value::Object(inputs.clone()));
                map.insert("attempts".to_string(), Value::from(*attempts));
            }
            Self::NotFinalized { component_id } => {
                map.insert(
                    "component_id".to_string(),
                    Value::String(component_id.clone()),
                );
            }
            _ => {}
        }
        map
    }
}

/// Returns a short name for the shape of a JSON value.
#[must_use]
pub const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "record",
    }
}

/// A failure reported by a component.
///
/// Permanent errors are never retried. Any other error is eligible for
/// retry under a `retry` policy.
#[derive(Debug)]
pub struct ComponentError {
    /// Human-readable message.
    pub message: String,
    /// Whether retrying could possibly help.
    pub permanent: bool,
    /// Underlying cause, if any.
    pub cause: Option<anyhow::Error>,
}

impl ComponentError {
    /// Creates a new, retryable component error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
            cause: None,
        }
    }

    /// Creates a permanent component error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            permanent: true,
            ..Self::new(message)
        }
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {cause}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ComponentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for ComponentError {
    fn from(cause: anyhow::Error) -> Self {
        Self {
            message: "component error".to_string(),
            permanent: false,
            cause: Some(cause),
        }
    }
}

/// Error raised when a flow program fails structural validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FlowValidationError {
    /// The error message.
    pub message: String,
    /// Individual problems, one per offending step or component.
    pub problems: Vec<String>,
}

impl FlowValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            problems: Vec::new(),
        }
    }

    /// Sets the individual problems.
    #[must_use]
    pub fn with_problems(mut self, problems: Vec<String>) -> Self {
        self.problems = problems;
        self
    }
}

/// Errors from a checkpoint log backend.
#[derive(Debug, Clone, Error)]
pub enum CheckpointError {
    /// A record could not be encoded or decoded.
    #[error("checkpoint serialization error: {0}")]
    Serialization(String),
    /// The backing storage failed.
    #[error("checkpoint storage error: {0}")]
    Storage(String),
    /// The log is unreadable as a whole.
    #[error("checkpoint log corrupted: {0}")]
    Corrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_unresolved_reference_message() {
        let err = FlowError::unresolved("nope", "nope.field");
        assert_eq!(
            err.to_string(),
            "unresolved reference 'nope' in {nope.field}"
        );
        assert_eq!(err.kind(), "unresolved_reference");
        assert!(err.is_structural());
    }

    #[test]
    fn test_type_mismatch_names_found_shape() {
        let err = FlowError::type_mismatch("x.y", "record", &serde_json::json!(3));
        match err {
            FlowError::TypeMismatch { found, .. } => assert_eq!(found, "number"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invocation_to_dict() {
        let mut inputs = Record::new();
        inputs.insert("n".to_string(), serde_json::json!(1));
        let err = FlowError::ComponentInvocation {
            step: "flow[0]".to_string(),
            component_id: "double".to_string(),
            inputs,
            attempts: 3,
            source: ComponentError::new("boom"),
        };

        let dict = err.to_dict();
        assert_eq!(dict["component_id"], "double");
        assert_eq!(dict["attempts"], 3);
        assert_eq!(dict["inputs"]["n"], 1);
        assert!(!err.is_structural());
    }

    #[test]
    fn test_component_error_cause_chain() {
        let err = ComponentError::new("fetch failed")
            .with_cause(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "fetch failed: connection reset");
        assert!(err.source().is_some());
        assert!(!err.permanent);
        assert!(ComponentError::permanent("bad input").permanent);
    }
}
