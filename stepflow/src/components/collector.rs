//! Accumulating sink.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::component::{
    Channel, Component, ComponentCategory, ComponentContext, ComponentManifest, FieldSpec,
};
use crate::core::{Record, ValueType};
use crate::errors::ComponentError;

/// Collects one item per call and publishes them when finalized.
///
/// With a `fields` config only those inputs are kept; otherwise the whole
/// input record is. Empty items are dropped. Finalizing writes
/// `{items, count}` to every configured destination: `return` exports it
/// under the component id, `file` writes it to `path`, `console` prints it.
#[derive(Debug)]
pub struct CollectorSink {
    id: String,
    config: Record,
    collected: Mutex<Vec<Record>>,
}

impl CollectorSink {
    /// Creates an empty collector.
    #[must_use]
    pub fn new(id: impl Into<String>, config: Record) -> Self {
        Self {
            id: id.into(),
            config,
            collected: Mutex::new(Vec::new()),
        }
    }

    /// Items collected so far.
    #[must_use]
    pub fn collected(&self) -> Vec<Record> {
        self.collected.lock().clone()
    }

    fn item_from(&self, inputs: &Record) -> Record {
        match self.config.get("fields").and_then(Value::as_array) {
            Some(fields) => fields
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|f| inputs.get(f).map(|v| (f.to_string(), v.clone())))
                .collect(),
            None => inputs.clone(),
        }
    }

    fn accumulate(&self, inputs: &Record) -> Record {
        let item = self.item_from(inputs);
        let mut collected = self.collected.lock();
        if !item.is_empty() {
            collected.push(item);
        }
        snapshot(&collected)
    }

    fn destinations(&self) -> Vec<String> {
        self.config
            .get("destinations")
            .and_then(Value::as_array)
            .map_or_else(
                || vec!["return".to_string()],
                |names| {
                    names
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                },
            )
    }
}

fn snapshot(collected: &[Record]) -> Record {
    let items: Vec<Value> = collected.iter().cloned().map(Value::Object).collect();
    let mut out = Record::new();
    out.insert("count".to_string(), json!(items.len()));
    out.insert("items".to_string(), Value::Array(items));
    out
}

#[async_trait]
impl Component for CollectorSink {
    fn describe(&self) -> ComponentManifest {
        ComponentManifest::new("sink/collector", ComponentCategory::Sink)
            .with_description("Collect data items during execution")
            .with_config("fields", FieldSpec::new(ValueType::List))
            .with_config(
                "destinations",
                FieldSpec::new(ValueType::List).with_default(json!(["return"])),
            )
            .with_config("path", FieldSpec::new(ValueType::Path))
            .with_output("items", FieldSpec::new(ValueType::List))
            .with_output("count", FieldSpec::new(ValueType::Integer))
    }

    async fn execute(
        &self,
        inputs: &Record,
        _ctx: &mut ComponentContext<'_>,
    ) -> Result<Record, ComponentError> {
        Ok(self.accumulate(inputs))
    }

    async fn finalize(&self, ctx: &mut ComponentContext<'_>) -> Result<Record, ComponentError> {
        let data = snapshot(&self.collected.lock());
        let default_path = format!("{}_results.json", self.id);
        let path = self
            .config
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or(&default_path);

        for name in self.destinations() {
            let channel = Channel::parse(&name, path).ok_or_else(|| {
                ComponentError::permanent(format!("unknown destination '{name}'"))
            })?;
            let value = match channel {
                Channel::Return => {
                    let mut entry = Record::new();
                    entry.insert(self.id.clone(), Value::Object(data.clone()));
                    Value::Object(entry)
                }
                _ => Value::Object(data.clone()),
            };
            ctx.write(&channel, value)?;
        }

        let count = data.get("count").and_then(serde_json::Value::as_u64).unwrap_or_default();
        tracing::debug!(component_id = %self.id, count, "Collector finalized");
        Ok(data)
    }

    fn replay(&self, inputs: &Record, _outputs: &Record) {
        self.accumulate(inputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::testing::RecordingDestinations;
    use std::path::PathBuf;

    fn item(n: i64) -> Record {
        let mut inputs = Record::new();
        inputs.insert("n".to_string(), json!(n));
        inputs.insert("noise".to_string(), json!("x"));
        inputs
    }

    #[tokio::test]
    async fn test_collects_in_call_order() {
        let mut config = Record::new();
        config.insert("fields".to_string(), json!(["n"]));
        let sink = CollectorSink::new("results", config);
        let scope = Scope::new();
        let destinations = RecordingDestinations::new();
        let mut ctx = ComponentContext::new("results", "flow[1].steps[0]", &scope, &destinations);

        for n in 1..=3 {
            sink.execute(&item(n), &mut ctx).await.unwrap();
        }
        sink.execute(&Record::new(), &mut ctx).await.unwrap();

        let out = sink.finalize(&mut ctx).await.unwrap();
        assert_eq!(out["count"], json!(3));
        assert_eq!(out["items"], json!([{"n": 1}, {"n": 2}, {"n": 3}]));

        let effects = ctx.into_effects();
        assert_eq!(effects.returns["results"]["count"], json!(3));
    }

    #[tokio::test]
    async fn test_finalize_writes_destinations() {
        let mut config = Record::new();
        config.insert("destinations".to_string(), json!(["file", "console"]));
        config.insert("path".to_string(), json!("out/results.json"));
        let sink = CollectorSink::new("results", config);
        let scope = Scope::new();
        let destinations = RecordingDestinations::new();
        let mut ctx = ComponentContext::new("results", "flow[2]", &scope, &destinations);

        sink.execute(&item(1), &mut ctx).await.unwrap();
        sink.finalize(&mut ctx).await.unwrap();

        let writes = destinations.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].0, Channel::File(PathBuf::from("out/results.json")));
        assert_eq!(writes[1].0, Channel::Console);
        assert!(ctx.into_effects().returns.is_empty());
    }

    #[tokio::test]
    async fn test_replay_rebuilds_state() {
        let sink = CollectorSink::new("results", Record::new());
        sink.replay(&item(7), &Record::new());
        assert_eq!(sink.collected(), vec![item(7)]);
    }

    #[tokio::test]
    async fn test_unknown_destination_is_permanent() {
        let mut config = Record::new();
        config.insert("destinations".to_string(), json!(["pigeon"]));
        let sink = CollectorSink::new("results", config);
        let scope = Scope::new();
        let destinations = RecordingDestinations::new();
        let mut ctx = ComponentContext::new("results", "flow[0]", &scope, &destinations);

        let err = sink.finalize(&mut ctx).await.unwrap_err();
        assert!(err.permanent);
    }
}
