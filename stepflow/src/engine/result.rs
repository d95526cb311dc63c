//! What a run reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::core::{Record, RunStatus, StepStatus};
use crate::errors::FlowError;
use crate::policy::AttemptRecord;

/// Outcome of one component step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Structural step path.
    pub step: String,
    /// Component id.
    pub component_id: String,
    /// Step kind.
    pub kind: String,
    /// Terminal status.
    pub status: StepStatus,
    /// Attempts made by this run. Zero when satisfied from the log.
    pub attempts: u32,
    /// Whether the outputs came from the checkpoint log.
    pub from_checkpoint: bool,
    /// Content hash, for checkpointed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl StepReport {
    /// Creates a report for an executed step.
    #[must_use]
    pub fn new(
        step: impl Into<String>,
        component_id: impl Into<String>,
        kind: impl Into<String>,
        status: StepStatus,
        attempts: u32,
    ) -> Self {
        Self {
            step: step.into(),
            component_id: component_id.into(),
            kind: kind.into(),
            status,
            attempts,
            from_checkpoint: false,
            hash: None,
        }
    }

    /// Sets the content hash.
    #[must_use]
    pub fn with_hash(mut self, hash: Option<String>) -> Self {
        self.hash = hash;
        self
    }

    /// Marks the step as satisfied from the checkpoint log.
    #[must_use]
    pub const fn replayed(mut self) -> Self {
        self.from_checkpoint = true;
        self
    }
}

/// A step whose failure was absorbed by `skip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStep {
    /// Structural step path.
    pub step: String,
    /// Component id.
    pub component_id: String,
    /// The failure that was skipped.
    pub error: String,
}

/// The error that stopped a run.
#[derive(Debug)]
pub struct RunFailure {
    /// Step being executed, if the failure came from one.
    pub step: Option<String>,
    /// Component being invoked, if any.
    pub component_id: Option<String>,
    /// The error.
    pub error: FlowError,
}

/// Counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Steps of any kind entered.
    pub steps_executed: u64,
    /// Component invocations actually executed (not replayed).
    pub components_executed: u64,
    /// Invocations satisfied from the checkpoint log.
    pub checkpoint_hits: u64,
    /// Records appended to the checkpoint log.
    pub checkpoint_appends: u64,
    /// Retry attempts made.
    pub retries: u64,
    /// Failures absorbed by `skip`.
    pub errors_recovered: u64,
}

/// Result of running a flow.
#[derive(Debug)]
pub struct RunResult {
    /// The run id. Pass it again to resume.
    pub run_id: String,
    /// The flow's name.
    pub flow_name: String,
    /// Overall status.
    pub status: RunStatus,
    /// Values written to the `return` channel.
    pub exports: Record,
    /// Root frame at the end of the run.
    pub bindings: Record,
    /// Steps whose failures were skipped.
    pub skipped: Vec<SkippedStep>,
    /// What stopped the run, for failed runs.
    pub failure: Option<RunFailure>,
    /// One report per component step, in execution order.
    pub reports: Vec<StepReport>,
    /// Every attempt made by this run.
    pub attempts: Vec<AttemptRecord>,
    /// Counters.
    pub stats: RunStats,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration_ms: f64,
}

impl RunResult {
    /// Returns true unless the run failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a component's output record from the root frame.
    #[must_use]
    pub fn output(&self, component_id: &str) -> Option<&Record> {
        self.bindings.get(component_id).and_then(Value::as_object)
    }

    /// Returns the error that stopped the run.
    #[must_use]
    pub fn error(&self) -> Option<&FlowError> {
        self.failure.as_ref().map(|f| &f.error)
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), json!(self.run_id));
        map.insert("flow_name".to_string(), json!(self.flow_name));
        map.insert("status".to_string(), json!(self.status));
        map.insert("exports".to_string(), Value::Object(self.exports.clone()));
        map.insert("bindings".to_string(), Value::Object(self.bindings.clone()));
        map.insert("skipped".to_string(), json!(self.skipped));
        map.insert(
            "failure".to_string(),
            self.failure.as_ref().map_or(Value::Null, |f| {
                json!({
                    "step": f.step,
                    "component_id": f.component_id,
                    "error": f.error.to_dict(),
                })
            }),
        );
        map.insert("reports".to_string(), json!(self.reports));
        map.insert("attempts".to_string(), json!(self.attempts));
        map.insert("stats".to_string(), json!(self.stats));
        map.insert("started_at".to_string(), json!(self.started_at.to_rfc3339()));
        map.insert("duration_ms".to_string(), json!(self.duration_ms));
        map
    }
}
