//! A source that emits a configured value.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::component::{
    Component, ComponentCategory, ComponentContext, ComponentManifest, FieldSpec,
};
use crate::core::{Record, ValueType};
use crate::errors::ComponentError;

/// Emits its configured `value`.
///
/// `items` is the value itself when it is a sequence, a one-element
/// sequence otherwise, and empty when the value is null.
#[derive(Debug, Clone)]
pub struct LiteralSource {
    config: Record,
}

impl LiteralSource {
    /// Creates a literal source from its config.
    #[must_use]
    pub const fn new(config: Record) -> Self {
        Self { config }
    }

    fn manifest() -> ComponentManifest {
        ComponentManifest::new("source/literal", ComponentCategory::Source)
            .with_description("Emit a configured value")
            .with_config(
                "value",
                FieldSpec::new(ValueType::Any).with_description("The value to emit"),
            )
            .with_output("value", FieldSpec::new(ValueType::Any))
            .with_output("items", FieldSpec::new(ValueType::List))
            .with_output("count", FieldSpec::new(ValueType::Integer))
    }
}

#[async_trait]
impl Component for LiteralSource {
    fn describe(&self) -> ComponentManifest {
        Self::manifest()
    }

    async fn execute(
        &self,
        _inputs: &Record,
        _ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        let value = self.config.get("value").cloned().unwrap_or(Value::Null);
        let items = match &value {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        };

        let mut out = Record::new();
        out.insert("count".to_string(), json!(items.len()));
        out.insert("items".to_string(), Value::Array(items));
        out.insert("value".to_string(), value);
        Ok(out)
    }
}
