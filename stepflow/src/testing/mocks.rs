//! Mock components for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::component::{
    Channel, Component, ComponentCategory, ComponentContext, ComponentManifest, DestinationWriter,
    FieldSpec,
};
use crate::core::{Record, ValueType};
use crate::errors::ComponentError;

type Behavior = Box<dyn Fn(&Record) -> Result<Record, ComponentError> + Send + Sync>;

/// A component that records every call it receives.
pub struct CountingComponent {
    manifest: ComponentManifest,
    behavior: Behavior,
    calls: Mutex<Vec<Record>>,
    fail_on: Option<Value>,
}

impl CountingComponent {
    /// Creates a counting component around a closure.
    pub fn new<F>(manifest: ComponentManifest, behavior: F) -> Self
    where
        F: Fn(&Record) -> Result<Record, ComponentError> + Send + Sync + 'static,
    {
        Self {
            manifest,
            behavior: Box::new(behavior),
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    /// A transform mapping input `n` to output `value = 2 * n`.
    #[must_use]
    pub fn doubler() -> Self {
        let manifest = ComponentManifest::new("test/double", ComponentCategory::Transform)
            .with_input("n", FieldSpec::new(ValueType::Integer).required())
            .with_output("value", FieldSpec::new(ValueType::Integer));
        Self::new(manifest, |inputs| {
            let n = inputs
                .get("n")
                .and_then(Value::as_i64)
                .ok_or_else(|| ComponentError::permanent("n must be an integer"))?;
            let mut out = Record::new();
            out.insert("value".to_string(), json!(n * 2));
            Ok(out)
        })
    }

    /// A source emitting `items` unchanged.
    #[must_use]
    pub fn source(items: Value) -> Self {
        let manifest = ComponentManifest::new("test/source", ComponentCategory::Source)
            .with_output("items", FieldSpec::new(ValueType::List));
        Self::new(manifest, move |_| {
            let mut out = Record::new();
            out.insert("items".to_string(), items.clone());
            Ok(out)
        })
    }

    /// Fails with a retryable error whenever input `n` equals `value`.
    #[must_use]
    pub fn failing_on(mut self, value: Value) -> Self {
        self.fail_on = Some(value);
        self
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Inputs of every call received, in order.
    #[must_use]
    pub fn recorded_inputs(&self) -> Vec<Record> {
        self.calls.lock().clone()
    }
}

impl std::fmt::Debug for CountingComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingComponent")
            .field("type", &self.manifest.type_name)
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl Component for CountingComponent {
    fn describe(&self) -> ComponentManifest {
        self.manifest.clone()
    }

    async fn execute(
        &self,
        inputs: &Record,
        _ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        self.calls.lock().push(inputs.clone());
        if let Some(bad) = &self.fail_on {
            if inputs.get("n") == Some(bad) {
                return Err(ComponentError::new(format!("refusing n = {bad}")));
            }
        }
        (self.behavior)(inputs)
    }
}

/// A component that fails its first `failures` calls.
#[derive(Debug)]
pub struct FlakyComponent {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyComponent {
    /// Creates a component failing `failures` times before succeeding.
    #[must_use]
    pub const fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for FlakyComponent {
    fn describe(&self) -> ComponentManifest {
        ComponentManifest::new("test/flaky", ComponentCategory::Transform)
            .with_output("value", FieldSpec::new(ValueType::Integer))
            .with_output("label", FieldSpec::new(ValueType::String))
    }

    async fn execute(
        &self,
        _inputs: &Record,
        _ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ComponentError::new(format!("transient failure #{call}")));
        }
        let mut out = Record::new();
        out.insert("value".to_string(), json!(call));
        out.insert("label".to_string(), json!("ok"));
        Ok(out)
    }
}

/// A component that sleeps before returning an empty record.
#[derive(Debug)]
pub struct SlowComponent {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowComponent {
    /// Creates a component that sleeps for `delay` on each call.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for SlowComponent {
    fn describe(&self) -> ComponentManifest {
        ComponentManifest::new("test/slow", ComponentCategory::Transform)
    }

    async fn execute(
        &self,
        _inputs: &Record,
        _ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Record::new())
    }
}

/// A destination writer that keeps writes in memory.
#[derive(Debug, Default)]
pub struct RecordingDestinations {
    writes: Mutex<Vec<(Channel, Value)>>,
}

impl RecordingDestinations {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write received, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(Channel, Value)> {
        self.writes.lock().clone()
    }
}

impl DestinationWriter for RecordingDestinations {
    fn write(&self, channel: &Channel, value: &Value) -> Result<(), ComponentError> {
        self.writes.lock().push((channel.clone(), value.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    #[tokio::test]
    async fn test_counting_doubler() {
        let component = CountingComponent::doubler().failing_on(json!(3));
        let scope = Scope::new();
        let destinations = RecordingDestinations::new();
        let mut ctx = ComponentContext::new("double", "flow[0]", &scope, &destinations);

        let mut inputs = Record::new();
        inputs.insert("n".to_string(), json!(4));
        let out = component.execute(&inputs, &mut ctx).await.unwrap();
        assert_eq!(out["value"], json!(8));

        inputs.insert("n".to_string(), json!(3));
        assert!(component.execute(&inputs, &mut ctx).await.is_err());
        assert_eq!(component.calls(), 2);
    }

    #[tokio::test]
    async fn test_flaky_component() {
        let component = FlakyComponent::new(1);
        let scope = Scope::new();
        let destinations = RecordingDestinations::new();
        let mut ctx = ComponentContext::new("flaky", "flow[0]", &scope, &destinations);

        assert!(component.execute(&Record::new(), &mut ctx).await.is_err());
        let out = component.execute(&Record::new(), &mut ctx).await.unwrap();
        assert_eq!(out["value"], json!(2));
    }

    #[test]
    fn test_recording_destinations() {
        let destinations = RecordingDestinations::new();
        destinations.write(&Channel::Console, &json!({"a": 1})).unwrap();
        assert_eq!(destinations.writes().len(), 1);
    }
}
