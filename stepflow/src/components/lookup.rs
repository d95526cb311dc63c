//! Dictionary lookup transform.

use async_trait::async_trait;
use serde_json::Value;

use crate::component::{
    Component, ComponentCategory, ComponentContext, ComponentManifest, FieldSpec,
};
use crate::core::{Record, ValueType};
use crate::errors::ComponentError;

/// Looks `key` up in the `dict` input.
///
/// Missing keys yield the configured `default` and `found = false`.
#[derive(Debug, Clone)]
pub struct LookupTransform {
    config: Record,
}

impl LookupTransform {
    /// Creates a lookup transform from its config.
    #[must_use]
    pub const fn new(config: Record) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Component for LookupTransform {
    fn describe(&self) -> ComponentManifest {
        ComponentManifest::new("transform/lookup", ComponentCategory::Transform)
            .with_description("Look up a value from a record by key")
            .with_config(
                "default",
                FieldSpec::new(ValueType::Any).with_default(Value::Null),
            )
            .with_input("dict", FieldSpec::new(ValueType::Record).required())
            .with_input("key", FieldSpec::new(ValueType::String).required())
            .with_output("value", FieldSpec::new(ValueType::Any))
            .with_output("found", FieldSpec::new(ValueType::Boolean))
    }

    async fn execute(
        &self,
        inputs: &Record,
        _ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        let dict = inputs
            .get("dict")
            .and_then(Value::as_object)
            .ok_or_else(|| ComponentError::permanent("'dict' must be a record"))?;
        let key = inputs
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ComponentError::permanent("'key' must be a string"))?;

        let found = dict.get(key);
        let value = match found {
            Some(v) => v.clone(),
            None => self.config.get("default").cloned().unwrap_or(Value::Null),
        };

        let mut out = Record::new();
        out.insert("found".to_string(), Value::Bool(found.is_some()));
        out.insert("value".to_string(), value);
        Ok(out)
    }
}
