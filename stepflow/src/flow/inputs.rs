//! Declared flow inputs and load-time `{$inputs.X}` substitution.
//!
//! Input markers are replaced once, when a program is bound to its input
//! values. Runtime step expressions never see them, and text substituted
//! into a step is escaped so the runtime pass keeps it literal.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use super::program::{FlowProgram, Step};
use crate::core::{Record, ValueType};
use crate::errors::{FlowError, Result};
use crate::scope::escape;

/// A declared flow input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "InputDecl")]
pub struct InputSpec {
    /// The declared type.
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Whether the input must be supplied when it has no default.
    pub required: bool,
    /// Value used when the input is not supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl InputSpec {
    /// Creates a required input of the given type.
    #[must_use]
    pub const fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputDecl {
    Short(ValueType),
    Full {
        #[serde(rename = "type", default)]
        value_type: ValueType,
        #[serde(default = "required_by_default")]
        required: bool,
        #[serde(default)]
        default: Option<Value>,
        #[serde(default)]
        description: String,
    },
}

const fn required_by_default() -> bool {
    true
}

impl From<InputDecl> for InputSpec {
    fn from(decl: InputDecl) -> Self {
        match decl {
            InputDecl::Short(value_type) => Self::new(value_type),
            InputDecl::Full {
                value_type,
                required,
                default,
                description,
            } => Self {
                value_type,
                required,
                default,
                description,
            },
        }
    }
}

#[allow(clippy::expect_used)]
fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\$inputs\.([A-Za-z_][A-Za-z0-9_\-]*)\}").expect("marker pattern compiles")
    })
}

impl FlowProgram {
    /// Computes the effective input values from what the caller provided.
    ///
    /// Provided values win, then declared defaults. A required input with
    /// neither is an error; an optional one binds null. Undeclared provided
    /// values are passed through.
    pub fn effective_inputs(&self, provided: &Record) -> Result<Record> {
        let mut effective = provided.clone();

        for (name, spec) in &self.inputs {
            match provided.get(name) {
                Some(value) => {
                    if !value.is_null() && !spec.value_type.accepts(value) {
                        return Err(FlowError::InvalidInput {
                            name: name.clone(),
                            message: format!(
                                "expected {}, got {}",
                                spec.value_type,
                                crate::errors::value_kind(value)
                            ),
                        });
                    }
                }
                None => match &spec.default {
                    Some(default) => {
                        effective.insert(name.clone(), default.clone());
                    }
                    None if spec.required => return Err(FlowError::MissingInput(name.clone())),
                    None => {
                        effective.insert(name.clone(), Value::Null);
                    }
                },
            }
        }

        Ok(effective)
    }

    /// Returns a copy of the program with every `{$inputs.X}` marker
    /// replaced, plus the effective input values.
    ///
    /// A marker that is the whole string becomes the raw value; a marker
    /// embedded in text becomes its text form. Braces in values bound into
    /// steps are escaped, so `"hi {user}"` reaches the component verbatim.
    pub fn bind_inputs(&self, provided: &Record) -> Result<(Self, Record)> {
        let values = self.effective_inputs(provided)?;
        let mut bound = self.clone();

        for decl in bound.components.values_mut() {
            decl.config = substitute_record(&decl.config, &values, Target::Config)?;
        }
        bind_steps(&mut bound.steps, &values)?;

        tracing::debug!(flow = %self.name, inputs = values.len(), "Bound flow inputs");
        Ok((bound, values))
    }
}

/// Where substituted values end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Component config, handed to the factory as is.
    Config,
    /// Step expressions, resolved against the scope when the step runs.
    Step,
}

fn bind_steps(steps: &mut [Step], values: &Record) -> Result<()> {
    for step in steps {
        match step {
            Step::Call(call) => call.inputs = substitute_record(&call.inputs, values, Target::Step)?,
            Step::Loop(step) => {
                step.spec.over = substitute(&step.spec.over, values, Target::Step)?;
                bind_steps(&mut step.spec.steps, values)?;
            }
            Step::Conditional(step) => {
                step.spec.condition = substitute(&step.spec.condition, values, Target::Step)?;
                bind_steps(&mut step.spec.then_steps, values)?;
                bind_steps(&mut step.spec.else_steps, values)?;
            }
            Step::Source(_) | Step::Sink(_) => {}
        }
    }
    Ok(())
}

fn substitute_record(record: &Record, values: &Record, target: Target) -> Result<Record> {
    record
        .iter()
        .map(|(key, value)| Ok((key.clone(), substitute(value, values, target)?)))
        .collect()
}

fn substitute(value: &Value, values: &Record, target: Target) -> Result<Value> {
    match value {
        Value::String(text) => substitute_text(text, values, target),
        Value::Array(items) => items
            .iter()
            .map(|item| substitute(item, values, target))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => substitute_record(map, values, target).map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Escapes every string inside a value bound into a step.
fn escape_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(escape(text)),
        Value::Array(items) => Value::Array(items.iter().map(escape_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), escape_value(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_text(text: &str, values: &Record, target: Target) -> Result<Value> {
    let pattern = marker_pattern();
    let lookup = |name: &str| {
        values
            .get(name)
            .ok_or_else(|| FlowError::unresolved(format!("$inputs.{name}"), format!("$inputs.{name}")))
    };

    if let Some(caps) = pattern.captures(text) {
        if caps.get(0).map(|m| m.as_str().len()) == Some(text.len()) {
            let value = lookup(&caps[1])?;
            return Ok(match target {
                Target::Config => value.clone(),
                Target::Step => escape_value(value),
            });
        }
    } else {
        return Ok(Value::String(text.to_string()));
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        let rendered = match lookup(&caps[1])? {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        match target {
            Target::Config => out.push_str(&rendered),
            Target::Step => out.push_str(&escape(&rendered)),
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn program() -> FlowProgram {
        serde_json::from_value(json!({
            "name": "greet",
            "inputs": {
                "names": "list",
                "greeting": {"type": "string", "default": "hello"},
                "limit": {"type": "integer", "required": false}
            },
            "components": {
                "words": {"type": "source/literal", "config": {"value": "{$inputs.names}"}},
                "greet": {"type": "transform/template"}
            },
            "flow": [
                {"source": "words"},
                {"loop": {"over": "{$inputs.names}", "steps": [
                    {"call": "greet", "inputs": {"template": "{$inputs.greeting}, {item}!"}}
                ]}}
            ]
        }))
        .unwrap()
    }

    fn provided(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_shorthand_input_is_required() {
        let p = program();
        assert_eq!(p.inputs["names"].value_type, ValueType::List);
        assert!(p.inputs["names"].required);
        assert!(!p.inputs["limit"].required);
    }

    #[test]
    fn test_effective_inputs_apply_defaults() {
        let values = program()
            .effective_inputs(&provided(json!({"names": ["ada"]})))
            .unwrap();
        assert_eq!(values["greeting"], json!("hello"));
        assert_eq!(values["limit"], Value::Null);
    }

    #[test]
    fn test_missing_required_input() {
        let err = program().effective_inputs(&Record::new()).unwrap_err();
        assert!(matches!(err, FlowError::MissingInput(name) if name == "names"));
    }

    #[test]
    fn test_invalid_input_type() {
        let err = program()
            .effective_inputs(&provided(json!({"names": "ada"})))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput { .. }));
    }

    #[test]
    fn test_markers_substituted_once() {
        let (bound, _) = program()
            .bind_inputs(&provided(json!({"names": ["ada", "alan"]})))
            .unwrap();

        assert_eq!(bound.components["words"].config["value"], json!(["ada", "alan"]));
        let Step::Loop(step) = &bound.steps[1] else {
            panic!("expected loop");
        };
        assert_eq!(step.spec.over, json!(["ada", "alan"]));
        let Step::Call(call) = &step.spec.steps[0] else {
            panic!("expected call");
        };
        assert_eq!(call.inputs["template"], json!("hello, {item}!"));
    }

    #[test]
    fn test_braces_in_input_values_stay_literal() {
        let (bound, _) = program()
            .bind_inputs(&provided(json!({"names": ["{ada}"], "greeting": "hi {user}"})))
            .unwrap();

        assert_eq!(bound.components["words"].config["value"], json!(["{ada}"]));
        let Step::Loop(step) = &bound.steps[1] else {
            panic!("expected loop");
        };
        assert_eq!(step.spec.over, json!(["\\{ada\\}"]));
        let Step::Call(call) = &step.spec.steps[0] else {
            panic!("expected call");
        };
        assert_eq!(call.inputs["template"], json!("hi \\{user\\}, {item}!"));

        let scope = crate::scope::Scope::with_root(provided(json!({"item": "ada"})));
        assert_eq!(
            scope.resolve_value(&call.inputs["template"]).unwrap(),
            json!("hi {user}, ada!")
        );
        assert_eq!(scope.resolve_value(&step.spec.over).unwrap(), json!(["{ada}"]));
    }

    #[test]
    fn test_unknown_marker_is_unresolved() {
        let err = substitute_text("{$inputs.ghost}", &Record::new(), Target::Step).unwrap_err();
        assert!(matches!(err, FlowError::UnresolvedReference { name, .. } if name == "$inputs.ghost"));
    }
}
