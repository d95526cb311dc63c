//! String template transform.

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

use crate::component::{
    Component, ComponentCategory, ComponentContext, ComponentManifest, FieldSpec,
};
use crate::core::{Record, ValueType};
use crate::errors::ComponentError;

#[allow(clippy::expect_used)]
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern compiles"))
}

/// Interpolates `{name}` placeholders.
///
/// The template comes from the `template` input, or from config when the
/// input is absent. Placeholders are looked up in the `values` input, then
/// the other inputs, then the scope. Unknown placeholders stay as written.
#[derive(Debug, Clone)]
pub struct TemplateTransform {
    config: Record,
}

impl TemplateTransform {
    /// Creates a template transform from its config.
    #[must_use]
    pub const fn new(config: Record) -> Self {
        Self { config }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Component for TemplateTransform {
    fn describe(&self) -> ComponentManifest {
        ComponentManifest::new("transform/template", ComponentCategory::Transform)
            .with_description("String template interpolation")
            .with_config("template", FieldSpec::new(ValueType::String))
            .with_input("template", FieldSpec::new(ValueType::String))
            .with_input(
                "values",
                FieldSpec::new(ValueType::Record).with_default(Value::Object(Record::new())),
            )
            .with_output("result", FieldSpec::new(ValueType::String))
    }

    // Inputs beyond `template` and `values` are accepted as placeholders.
    fn validate(&self, inputs: &Record) -> crate::component::ValidationResult {
        let mut result = self.describe().validate_inputs(inputs);
        result.warnings.clear();
        result
    }

    async fn execute(
        &self,
        inputs: &Record,
        ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        let template = inputs
            .get("template")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .or_else(|| self.config.get("template").and_then(Value::as_str))
            .ok_or_else(|| ComponentError::permanent("no template provided"))?;

        let mut values = inputs
            .get("values")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for (key, value) in inputs {
            if key != "values" {
                values.insert(key.clone(), value.clone());
            }
        }

        let result = placeholder_pattern().replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            values
                .get(key)
                .or_else(|| ctx.get(key))
                .map_or_else(|| caps[0].to_string(), render)
        });

        let mut out = Record::new();
        out.insert("result".to_string(), Value::String(result.into_owned()));
        Ok(out)
    }
}
