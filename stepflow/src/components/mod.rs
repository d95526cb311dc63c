//! Built-in component types.

mod collector;
mod literal;
mod lookup;
mod template;

pub use collector::CollectorSink;
pub use literal::LiteralSource;
pub use lookup::LookupTransform;
pub use template::TemplateTransform;

use std::sync::Arc;

use crate::component::{ComponentCategory, ComponentRegistry};
use crate::errors::Result;

/// Registers every built-in component type.
pub fn register_builtins(registry: &mut ComponentRegistry) -> Result<()> {
    registry.register("source/literal", ComponentCategory::Source, |_, config| {
        Ok(Arc::new(LiteralSource::new(config.clone())))
    })?;
    registry.register("transform/template", ComponentCategory::Transform, |_, config| {
        Ok(Arc::new(TemplateTransform::new(config.clone())))
    })?;
    registry.register("transform/lookup", ComponentCategory::Transform, |_, config| {
        Ok(Arc::new(LookupTransform::new(config.clone())))
    })?;
    registry.register("sink/collector", ComponentCategory::Sink, |id, config| {
        Ok(Arc::new(CollectorSink::new(id, config.clone())))
    })?;
    Ok(())
}
