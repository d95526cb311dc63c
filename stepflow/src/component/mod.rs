//! The component contract.
//!
//! Components are the units a flow invokes. The interpreter only depends on
//! the [`Component`] trait: describe, validate, execute, plus the finalize
//! and replay hooks accumulators use.

mod context;
mod manifest;
mod registry;

pub use context::{Channel, ComponentContext, DestinationWriter, Effects, StandardDestinations};
pub use manifest::{ComponentCategory, ComponentManifest, FieldSpec, ValidationResult};
pub use registry::{ComponentFactory, ComponentRegistry, ComponentSet};

use async_trait::async_trait;
use std::fmt::Debug;

use crate::core::Record;
use crate::errors::ComponentError;

/// Trait for flow components.
///
/// One instance exists per component id for the lifetime of a run, so an
/// instance may accumulate state across calls through interior mutability.
#[async_trait]
pub trait Component: Send + Sync + Debug {
    /// Returns the component's manifest.
    fn describe(&self) -> ComponentManifest;

    /// Checks resolved inputs before execution.
    fn validate(&self, inputs: &Record) -> ValidationResult {
        self.describe().validate_inputs(inputs)
    }

    /// Executes the component.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Resolved inputs, with declared defaults applied
    /// * `ctx` - The invocation context
    async fn execute(
        &self,
        inputs: &Record,
        ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError>;

    /// Finalizes accumulated state. Runs for `sink` steps.
    async fn finalize(&self, ctx: &mut ComponentContext<'_>) -> Result<Record, ComponentError> {
        self.execute(&Record::new(), ctx).await
    }

    /// Rebuilds in-memory state from a recorded call instead of executing.
    ///
    /// Called on the resume fast path. Must not perform external effects.
    fn replay(&self, _inputs: &Record, _outputs: &Record) {}
}

/// A synchronous closure-backed component.
pub struct FnComponent<F>
where
    F: Fn(&Record) -> Result<Record, ComponentError> + Send + Sync,
{
    manifest: ComponentManifest,
    func: F,
}

impl<F> FnComponent<F>
where
    F: Fn(&Record) -> Result<Record, ComponentError> + Send + Sync,
{
    /// Creates a component from a manifest and a closure.
    pub const fn new(manifest: ComponentManifest, func: F) -> Self {
        Self { manifest, func }
    }
}

impl<F> Debug for FnComponent<F>
where
    F: Fn(&Record) -> Result<Record, ComponentError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnComponent")
            .field("type", &self.manifest.type_name)
            .finish()
    }
}

#[async_trait]
impl<F> Component for FnComponent<F>
where
    F: Fn(&Record) -> Result<Record, ComponentError> + Send + Sync,
{
    fn describe(&self) -> ComponentManifest {
        self.manifest.clone()
    }

    async fn execute(
        &self,
        inputs: &Record,
        _ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        (self.func)(inputs)
    }
}
