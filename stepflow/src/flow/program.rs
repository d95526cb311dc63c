//! The flow program model and its document form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::inputs::InputSpec;
use crate::core::Record;
use crate::errors::{FlowValidationError, Result};
use crate::policy::ErrorHandling;

/// A component entry in a flow's component table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDecl {
    /// The registered component type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Static configuration handed to the factory.
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub config: Record,
    /// Per-component error-handling override.
    #[serde(flatten)]
    pub error_handling: ErrorHandling,
}

impl ComponentDecl {
    /// Creates a declaration with empty config.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            config: Record::new(),
            error_handling: ErrorHandling::default(),
        }
    }
}

/// `{"source": id}`: invoke a component with no inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceStep {
    /// The component to invoke.
    #[serde(rename = "source")]
    pub component_id: String,
    /// Output field to alias name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
}

/// `{"call": id, "inputs": {...}, "outputs": {...}}`: invoke with inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallStep {
    /// The component to invoke.
    #[serde(rename = "call")]
    pub component_id: String,
    /// Input name to binding expression.
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub inputs: Record,
    /// Output field to alias name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
}

/// The body of a loop step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopSpec {
    /// A reference to a sequence, or a literal sequence.
    pub over: Value,
    /// The name bound to each element.
    #[serde(rename = "as", default = "default_item_name")]
    pub item_name: String,
    /// The name bound to each zero-based position, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// The steps run once per element.
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_item_name() -> String {
    "item".to_string()
}

/// `{"loop": {...}}`: iterate a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopStep {
    /// The loop definition.
    #[serde(rename = "loop")]
    pub spec: LoopSpec,
}

/// `{"sink": id}`: finalize an accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkStep {
    /// The accumulator to finalize.
    #[serde(rename = "sink")]
    pub component_id: String,
    /// Output field to alias name. Visible only after the sink runs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
}

/// The body of a conditional step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalSpec {
    /// The condition, usually a reference.
    #[serde(rename = "if")]
    pub condition: Value,
    /// Steps run when the condition is truthy.
    #[serde(rename = "then", default)]
    pub then_steps: Vec<Step>,
    /// Steps run otherwise.
    #[serde(rename = "else", default, skip_serializing_if = "Vec::is_empty")]
    pub else_steps: Vec<Step>,
}

/// `{"conditional": {...}}`: pick a branch in the current frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalStep {
    /// The conditional definition.
    #[serde(rename = "conditional")]
    pub spec: ConditionalSpec,
}

/// One program instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// Invoke a no-input component.
    Source(SourceStep),
    /// Invoke a component with resolved inputs.
    Call(CallStep),
    /// Iterate a sequence.
    Loop(LoopStep),
    /// Finalize an accumulator.
    Sink(SinkStep),
    /// Choose between two step lists.
    Conditional(ConditionalStep),
}

impl Step {
    /// Creates a source step.
    #[must_use]
    pub fn source(component_id: impl Into<String>) -> Self {
        Self::Source(SourceStep {
            component_id: component_id.into(),
            outputs: BTreeMap::new(),
        })
    }

    /// Creates a call step.
    #[must_use]
    pub fn call(component_id: impl Into<String>, inputs: Record) -> Self {
        Self::Call(CallStep {
            component_id: component_id.into(),
            inputs,
            outputs: BTreeMap::new(),
        })
    }

    /// Creates a loop step.
    #[must_use]
    pub fn loop_over(over: Value, item_name: impl Into<String>, steps: Vec<Self>) -> Self {
        Self::Loop(LoopStep {
            spec: LoopSpec {
                over,
                item_name: item_name.into(),
                index: None,
                steps,
            },
        })
    }

    /// Creates a sink step.
    #[must_use]
    pub fn sink(component_id: impl Into<String>) -> Self {
        Self::Sink(SinkStep {
            component_id: component_id.into(),
            outputs: BTreeMap::new(),
        })
    }

    /// Returns the component this step invokes directly, if any.
    #[must_use]
    pub fn component_id(&self) -> Option<&str> {
        match self {
            Self::Source(step) => Some(&step.component_id),
            Self::Call(step) => Some(&step.component_id),
            Self::Sink(step) => Some(&step.component_id),
            Self::Loop(_) | Self::Conditional(_) => None,
        }
    }

    /// Returns a short name for the step kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Call(_) => "call",
            Self::Loop(_) => "loop",
            Self::Sink(_) => "sink",
            Self::Conditional(_) => "conditional",
        }
    }

    /// Returns the nested step lists with their path labels.
    #[must_use]
    pub fn children(&self) -> Vec<(&'static str, &[Self])> {
        match self {
            Self::Loop(step) => vec![("steps", step.spec.steps.as_slice())],
            Self::Conditional(step) => vec![
                ("then", step.spec.then_steps.as_slice()),
                ("else", step.spec.else_steps.as_slice()),
            ],
            _ => Vec::new(),
        }
    }
}

/// A loaded flow program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowProgram {
    /// The flow name.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Declared inputs.
    #[serde(default)]
    pub inputs: BTreeMap<String, InputSpec>,
    /// Component table, keyed by id.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentDecl>,
    /// Flow-level error-handling default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<ErrorHandling>,
    /// The ordered step program.
    #[serde(rename = "flow", default)]
    pub steps: Vec<Step>,
}

impl FlowProgram {
    /// Creates an empty program.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            inputs: BTreeMap::new(),
            components: BTreeMap::new(),
            error_handling: None,
            steps: Vec::new(),
        }
    }

    /// Parses a program from its JSON document form.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Declares a component.
    #[must_use]
    pub fn with_component(mut self, id: impl Into<String>, decl: ComponentDecl) -> Self {
        self.components.insert(id.into(), decl);
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Sets the flow-level error-handling default.
    #[must_use]
    pub fn with_error_handling(mut self, rule: ErrorHandling) -> Self {
        self.error_handling = Some(rule);
        self
    }

    /// Visits every step with its structural path, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&str, &'a Step)) {
        fn walk_list<'a>(steps: &'a [Step], prefix: &str, visit: &mut dyn FnMut(&str, &'a Step)) {
            for (i, step) in steps.iter().enumerate() {
                let path = format!("{prefix}[{i}]");
                visit(&path, step);
                for (label, children) in step.children() {
                    walk_list(children, &format!("{path}.{label}"), visit);
                }
            }
        }
        walk_list(&self.steps, "flow", visit);
    }

    /// Returns the ids finalized by some `sink` step.
    #[must_use]
    pub fn sink_targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        self.walk(&mut |_, step| {
            if let Step::Sink(sink) = step {
                if !targets.contains(&sink.component_id) {
                    targets.push(sink.component_id.clone());
                }
            }
        });
        targets
    }

    /// Checks that every step names a declared component.
    pub fn validate(&self) -> std::result::Result<(), FlowValidationError> {
        let mut problems = Vec::new();
        self.walk(&mut |path, step| {
            if let Some(id) = step.component_id() {
                if !self.components.contains_key(id) {
                    problems.push(format!("{path}: unknown component '{id}'"));
                }
            }
        });

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FlowValidationError::new(format!(
                "flow '{}' references {} undeclared component(s)",
                self.name,
                problems.len()
            ))
            .with_problems(problems))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> FlowProgram {
        serde_json::from_value(json!({
            "name": "double-all",
            "description": "doubles numbers",
            "inputs": {"numbers": {"type": "list", "default": [1, 2, 3]}},
            "components": {
                "nums": {"type": "source/literal", "config": {"value": [1, 2, 3]}},
                "double": {"type": "test/double", "on_error": "retry", "max_retries": 2},
                "collect": {"type": "sink/collector"}
            },
            "error_handling": {"default": "skip"},
            "flow": [
                {"source": "nums"},
                {"loop": {"over": "nums.items", "as": "n", "index": "i", "steps": [
                    {"call": "double", "inputs": {"n": "{n}"}, "outputs": {"value": "doubled"}},
                    {"call": "collect", "inputs": {"value": "{doubled}"}}
                ]}},
                {"sink": "collect"},
                {"conditional": {"if": "{collect.count}", "then": [{"source": "nums"}]}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_document_parses_every_step_kind() {
        let program = sample();
        let kinds: Vec<_> = program.steps.iter().map(Step::kind).collect();
        assert_eq!(kinds, vec!["source", "loop", "sink", "conditional"]);

        let Step::Loop(step) = &program.steps[1] else {
            panic!("expected loop");
        };
        assert_eq!(step.spec.item_name, "n");
        assert_eq!(step.spec.index.as_deref(), Some("i"));
        assert_eq!(step.spec.steps.len(), 2);
    }

    #[test]
    fn test_loop_item_name_defaults() {
        let step: Step = serde_json::from_value(json!({"loop": {"over": [1], "steps": []}})).unwrap();
        let Step::Loop(step) = step else {
            panic!("expected loop");
        };
        assert_eq!(step.spec.item_name, "item");
    }

    #[test]
    fn test_component_error_handling_flattened() {
        let program = sample();
        let decl = &program.components["double"];
        assert_eq!(decl.error_handling.on_error, Some(PolicyKind::Retry));
        assert_eq!(decl.error_handling.max_retries, Some(2));
        assert_eq!(
            program.error_handling.as_ref().and_then(|e| e.on_error),
            Some(PolicyKind::Skip)
        );
    }

    #[test]
    fn test_unknown_step_shape_rejected() {
        let result: std::result::Result<Step, _> =
            serde_json::from_value(json!({"invoke": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_walk_paths() {
        let mut paths = Vec::new();
        sample().walk(&mut |path, _| paths.push(path.to_string()));
        assert_eq!(
            paths,
            vec![
                "flow[0]",
                "flow[1]",
                "flow[1].steps[0]",
                "flow[1].steps[1]",
                "flow[2]",
                "flow[3]",
                "flow[3].then[0]",
            ]
        );
    }

    #[test]
    fn test_sink_targets() {
        assert_eq!(sample().sink_targets(), vec!["collect".to_string()]);
    }

    #[test]
    fn test_validate_reports_undeclared_components() {
        let program = FlowProgram::new("broken")
            .with_component("a", ComponentDecl::new("source/literal"))
            .with_step(Step::source("a"))
            .with_step(Step::loop_over(json!([1]), "x", vec![Step::sink("ghost")]));

        let err = program.validate().unwrap_err();
        assert_eq!(err.problems, vec!["flow[1].steps[0]: unknown component 'ghost'"]);
        assert!(sample().validate().is_ok());
    }
}
