//! Component manifests and input validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{null_record, Record, ValueType};
use crate::policy::ErrorHandling;

/// The role a component plays in a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    /// Produces data without inputs.
    Source,
    /// Maps inputs to outputs.
    #[default]
    Transform,
    /// Accumulates data and writes it out on finalize.
    Sink,
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Transform => write!(f, "transform"),
            Self::Sink => write!(f, "sink"),
        }
    }
}

/// Specification of one config, input or output field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// The declared type.
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    /// Whether the field must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Value used when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldSpec {
    /// Creates an optional field of the given type.
    #[must_use]
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            ..Self::default()
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The result of validating inputs against a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the inputs are acceptable.
    pub valid: bool,
    /// Problems that make the inputs unacceptable.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Problems worth reporting that do not block execution.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing result.
    #[must_use]
    pub const fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// A component's self-description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentManifest {
    /// The registered type name, e.g. `sink/collector`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// The component's role.
    #[serde(default)]
    pub category: ComponentCategory,
    /// Static configuration fields.
    #[serde(default)]
    pub config: BTreeMap<String, FieldSpec>,
    /// Input fields. An empty map accepts any inputs.
    #[serde(default)]
    pub inputs: BTreeMap<String, FieldSpec>,
    /// Output fields.
    #[serde(default)]
    pub outputs: BTreeMap<String, FieldSpec>,
    /// Policy the component asks for when the flow does not override it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_policy: Option<ErrorHandling>,
}

impl ComponentManifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new(type_name: impl Into<String>, category: ComponentCategory) -> Self {
        Self {
            type_name: type_name.into(),
            description: String::new(),
            category,
            config: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            error_policy: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares a config field.
    #[must_use]
    pub fn with_config(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.config.insert(name.into(), spec);
        self
    }

    /// Declares an input field.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.inputs.insert(name.into(), spec);
        self
    }

    /// Declares an output field.
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.outputs.insert(name.into(), spec);
        self
    }

    /// Declares a preferred error policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorHandling) -> Self {
        self.error_policy = Some(policy);
        self
    }

    /// Returns an output record with every declared field set to null.
    #[must_use]
    pub fn null_outputs(&self) -> Record {
        null_record(self.outputs.keys().cloned())
    }

    /// Fills absent inputs from their declared defaults.
    #[must_use]
    pub fn apply_input_defaults(&self, inputs: &Record) -> Record {
        let mut merged = inputs.clone();
        for (name, spec) in &self.inputs {
            if let Some(default) = &spec.default {
                merged
                    .entry(name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        merged
    }

    /// Returns the config value for `key`, falling back to its default.
    #[must_use]
    pub fn config_value<'a>(&'a self, config: &'a Record, key: &str) -> Option<&'a Value> {
        config
            .get(key)
            .filter(|v| !v.is_null())
            .or_else(|| self.config.get(key).and_then(|spec| spec.default.as_ref()))
    }

    /// Checks inputs against the declared input fields.
    ///
    /// Missing required fields and type mismatches are errors. Fields the
    /// manifest does not declare are warnings. A manifest with no declared
    /// inputs accepts anything.
    #[must_use]
    pub fn validate_inputs(&self, inputs: &Record) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.inputs.is_empty() {
            return result;
        }

        for (name, spec) in &self.inputs {
            match inputs.get(name) {
                None if spec.required && spec.default.is_none() => {
                    result.errors.push(format!("missing required input '{name}'"));
                }
                Some(value) if !value.is_null() && !spec.value_type.accepts(value) => {
                    result.errors.push(format!(
                        "input '{name}' expected {}, got {}",
                        spec.value_type,
                        crate::errors::value_kind(value)
                    ));
                }
                _ => {}
            }
        }

        for name in inputs.keys() {
            if !self.inputs.contains_key(name) {
                result.warnings.push(format!("unexpected input '{name}'"));
            }
        }

        result.valid = result.errors.is_empty();
        result
    }
}
