//! The step interpreter.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::config::{EngineConfig, RunOptions};
use super::result::{RunFailure, RunResult, RunStats, SkippedStep, StepReport};
use crate::cancellation::CancellationToken;
use crate::checkpoint::{
    content_hash, CheckpointLog, CheckpointRecord, CheckpointSession, JsonlCheckpointLog,
    RecordStatus,
};
use crate::component::{
    Component, ComponentRegistry, ComponentSet, DestinationWriter, Effects, StandardDestinations,
};
use crate::core::{Record, RunStatus, StepStatus};
use crate::errors::{FlowError, FlowValidationError, Result};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::flow::{ConditionalSpec, FlowProgram, LoopSpec, Step};
use crate::observability::SpanTimer;
use crate::policy::{
    invoke, AttemptRecord, ErrorPolicy, Invocation, InvocationKind, InvocationOutcome,
};
use crate::scope::{Expr, Frame, Scope};

/// Runs flow programs against a component registry.
///
/// One engine can run many flows, sequentially or concurrently; each run
/// gets its own component instances and scope.
pub struct FlowEngine {
    registry: Arc<ComponentRegistry>,
    config: EngineConfig,
    checkpoint_log: Option<Arc<dyn CheckpointLog>>,
    event_sink: Arc<dyn EventSink>,
    destinations: Option<Arc<dyn DestinationWriter>>,
}

impl FlowEngine {
    /// Creates an engine over a populated registry.
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            config: EngineConfig::default(),
            checkpoint_log: None,
            event_sink: Arc::new(NoOpEventSink),
            destinations: None,
        }
    }

    /// Creates an engine whose registry holds the built-in components.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = ComponentRegistry::new();
        crate::components::register_builtins(&mut registry)?;
        Ok(Self::new(registry))
    }

    /// Sets the engine config.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables checkpointing to the given log.
    #[must_use]
    pub fn with_checkpoint_log(mut self, log: Arc<dyn CheckpointLog>) -> Self {
        self.checkpoint_log = Some(log);
        self
    }

    /// Enables checkpointing to JSONL files under the configured
    /// `checkpoint_dir`.
    #[must_use]
    pub fn with_jsonl_checkpoints(self) -> Self {
        let log = JsonlCheckpointLog::new(self.config.checkpoint_dir.clone());
        self.with_checkpoint_log(Arc::new(log))
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Replaces the file and console destination writer.
    #[must_use]
    pub fn with_destinations(mut self, destinations: Arc<dyn DestinationWriter>) -> Self {
        self.destinations = Some(destinations);
        self
    }

    /// The engine config.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Runs a flow, instantiating its declared components from the registry.
    ///
    /// `Err` is returned only when the run cannot start: an invalid
    /// program, bad inputs, an unknown component type, or an unreadable
    /// checkpoint log. Failures during the run are reported in the result.
    pub async fn run(
        &self,
        program: &FlowProgram,
        inputs: &Record,
        options: RunOptions,
    ) -> Result<RunResult> {
        program.validate()?;
        let (bound, effective) = program.bind_inputs(inputs)?;
        let components = self.registry.instantiate(&bound)?;
        self.execute(bound, effective, components, options).await
    }

    /// Runs a flow against caller-supplied component instances.
    ///
    /// Every component id a step names must be present in `components`;
    /// the program's component table is only consulted for error policies.
    pub async fn run_with_components(
        &self,
        program: &FlowProgram,
        inputs: &Record,
        components: ComponentSet,
        options: RunOptions,
    ) -> Result<RunResult> {
        check_components(program, &components)?;
        let (bound, effective) = program.bind_inputs(inputs)?;
        self.execute(bound, effective, components, options).await
    }

    async fn execute(
        &self,
        program: FlowProgram,
        effective_inputs: Record,
        components: ComponentSet,
        options: RunOptions,
    ) -> Result<RunResult> {
        let run_id = options
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let timer = SpanTimer::start();
        let started_at = timer.started_at();

        let session = match &self.checkpoint_log {
            Some(log) => Some(CheckpointSession::open(log.clone(), run_id.clone()).await?),
            None => None,
        };

        let token = options
            .cancellation
            .clone()
            .unwrap_or_else(|| Arc::new(CancellationToken::new()));
        let timeout = options
            .timeout
            .or_else(|| self.config.timeout_ms.map(std::time::Duration::from_millis));
        let timeout_task = timeout.map(|limit| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                token.cancel("timeout");
            })
        });

        let standard;
        let destinations: &dyn DestinationWriter = match &self.destinations {
            Some(writer) => writer.as_ref(),
            None => {
                standard = StandardDestinations::new(self.config.output_dir.clone());
                &standard
            }
        };

        let mut scope = Scope::with_root(effective_inputs);
        for target in program.sink_targets() {
            scope.gate(target);
        }

        let policies = resolve_policies(&program, &components, &self.config);
        let mut interpreter = Interpreter {
            run_id: run_id.clone(),
            components,
            policies,
            scope,
            session,
            events: self.event_sink.as_ref(),
            destinations,
            token,
            exports: Record::new(),
            skipped: Vec::new(),
            reports: Vec::new(),
            attempts: Vec::new(),
            stats: RunStats::default(),
        };

        info!(run_id = %run_id, flow = %program.name, "Starting flow run");
        self.event_sink.try_emit(
            events::RUN_STARTED,
            Some(json!({"run_id": run_id, "flow": program.name})),
        );

        let outcome = interpreter.run_steps(&program.steps, "flow", "").await;

        if let Some(task) = timeout_task {
            task.abort();
        }

        let Interpreter {
            scope,
            session,
            exports,
            skipped,
            reports,
            attempts,
            mut stats,
            ..
        } = interpreter;
        if let Some(session) = &session {
            stats.checkpoint_appends = session.appends();
        }

        let failure = outcome.err();
        let status = if failure.is_some() {
            RunStatus::Failed
        } else if skipped.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::PartiallySkipped
        };
        let duration_ms = timer.finish();

        match &failure {
            None => {
                info!(
                    run_id = %run_id,
                    flow = %program.name,
                    status = %status,
                    duration_ms,
                    "Flow run finished"
                );
                self.event_sink.try_emit(
                    events::RUN_COMPLETED,
                    Some(json!({"run_id": run_id, "status": status, "stats": stats})),
                );
            }
            Some(failure) => {
                warn!(
                    run_id = %run_id,
                    flow = %program.name,
                    step = ?failure.step,
                    error = %failure.error,
                    "Flow run failed"
                );
                let event = if matches!(failure.error, FlowError::Cancelled(_)) {
                    events::RUN_CANCELLED
                } else {
                    events::RUN_FAILED
                };
                self.event_sink.try_emit(
                    event,
                    Some(json!({
                        "run_id": run_id,
                        "step": failure.step,
                        "error": failure.error.to_dict(),
                    })),
                );
            }
        }

        Ok(RunResult {
            run_id,
            flow_name: program.name.clone(),
            status,
            exports,
            bindings: scope.root_bindings().clone(),
            skipped,
            failure,
            reports,
            attempts,
            stats,
            started_at,
            duration_ms,
        })
    }
}

impl std::fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEngine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("checkpointing", &self.checkpoint_log.is_some())
            .finish_non_exhaustive()
    }
}

/// Checks that every step names an instance in `components`.
fn check_components(
    program: &FlowProgram,
    components: &ComponentSet,
) -> std::result::Result<(), FlowValidationError> {
    let mut problems = Vec::new();
    program.walk(&mut |path, step| {
        if let Some(id) = step.component_id() {
            if !components.contains(id) {
                problems.push(format!("{path}: no instance for component '{id}'"));
            }
        }
    });
    if problems.is_empty() {
        Ok(())
    } else {
        Err(FlowValidationError::new(format!(
            "flow '{}' references {} missing component(s)",
            program.name,
            problems.len()
        ))
        .with_problems(problems))
    }
}

/// Resolves one policy per component: flow entry, then manifest, then the
/// flow default.
fn resolve_policies(
    program: &FlowProgram,
    components: &ComponentSet,
    config: &EngineConfig,
) -> HashMap<String, ErrorPolicy> {
    let defaults = config.retry_defaults();
    components
        .iter()
        .map(|(id, component)| {
            let declared = program
                .components
                .get(id)
                .map(|decl| &decl.error_handling)
                .filter(|rule| !rule.is_empty());
            let manifest = component.describe().error_policy;
            let policy = ErrorPolicy::resolve(
                &[declared, manifest.as_ref(), program.error_handling.as_ref()],
                &defaults,
            );
            (id.to_string(), policy)
        })
        .collect()
}

/// Null, false, zero, and empty collections are false. So are the
/// strings `""`, `"0"`, `"false"` and `"no"`, in any case.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(s.to_lowercase().as_str(), "" | "0" | "false" | "no"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn failure(step: &str, component_id: Option<&str>, error: FlowError) -> RunFailure {
    RunFailure {
        step: Some(step.to_string()),
        component_id: component_id.map(String::from),
        error,
    }
}

type StepResult = std::result::Result<(), RunFailure>;

/// State of one run.
struct Interpreter<'e> {
    run_id: String,
    components: ComponentSet,
    policies: HashMap<String, ErrorPolicy>,
    scope: Scope,
    session: Option<CheckpointSession>,
    events: &'e dyn EventSink,
    destinations: &'e dyn DestinationWriter,
    token: Arc<CancellationToken>,
    exports: Record,
    skipped: Vec<SkippedStep>,
    reports: Vec<StepReport>,
    attempts: Vec<AttemptRecord>,
    stats: RunStats,
}

impl<'e> Interpreter<'e> {
    /// Runs a step list in order. `namespace` carries the enclosing loop
    /// iterations, e.g. `flow[1]#0/`.
    fn run_steps<'a>(
        &'a mut self,
        steps: &'a [Step],
        prefix: &'a str,
        namespace: &'a str,
    ) -> BoxFuture<'a, StepResult> {
        async move {
            for (i, step) in steps.iter().enumerate() {
                let path = format!("{prefix}[{i}]");
                if self.token.is_cancelled() {
                    let reason = self.token.reason().unwrap_or_default();
                    return Err(failure(
                        &path,
                        step.component_id(),
                        FlowError::Cancelled(reason),
                    ));
                }
                self.stats.steps_executed += 1;

                match step {
                    Step::Source(source) => {
                        self.run_component(
                            &path,
                            "source",
                            &source.component_id,
                            Record::new(),
                            &source.outputs,
                            namespace,
                        )
                        .await?;
                    }
                    Step::Call(call) => {
                        let inputs = self
                            .scope
                            .resolve_record(&call.inputs)
                            .map_err(|e| failure(&path, Some(&call.component_id), e))?;
                        self.run_component(
                            &path,
                            "call",
                            &call.component_id,
                            inputs,
                            &call.outputs,
                            namespace,
                        )
                        .await?;
                    }
                    Step::Loop(step) => self.run_loop(&path, &step.spec, namespace).await?,
                    Step::Sink(sink) => {
                        self.run_sink(&path, &sink.component_id, &sink.outputs)
                            .await?;
                    }
                    Step::Conditional(step) => {
                        self.run_conditional(&path, &step.spec, namespace).await?;
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn run_loop(&mut self, path: &str, spec: &LoopSpec, namespace: &str) -> StepResult {
        let source = match &spec.over {
            Value::String(path_text) => self.scope.resolve_expr(&Expr::parse_path(path_text)),
            literal => self.scope.resolve_value(literal),
        }
        .map_err(|e| failure(path, None, e))?;
        let items = match source {
            Value::Array(items) => items,
            other => {
                let expression = match &spec.over {
                    Value::String(text) => text.clone(),
                    over => over.to_string(),
                };
                return Err(failure(
                    path,
                    None,
                    FlowError::InvalidIterable {
                        expression,
                        found: crate::errors::value_kind(&other).to_string(),
                    },
                ));
            }
        };

        debug!(run_id = %self.run_id, step = %path, items = items.len(), "Entering loop");
        let body = format!("{path}.steps");
        for (index, item) in items.into_iter().enumerate() {
            let mut bindings = Record::new();
            bindings.insert(spec.item_name.clone(), item);
            if let Some(index_name) = &spec.index {
                bindings.insert(index_name.clone(), json!(index));
            }

            let child_namespace = format!("{namespace}{path}#{index}/");
            self.scope.push_frame(Frame::with_bindings(bindings));
            let result = self.run_steps(&spec.steps, &body, &child_namespace).await;
            self.scope.pop_frame();
            result?;
        }
        Ok(())
    }

    async fn run_conditional(
        &mut self,
        path: &str,
        spec: &ConditionalSpec,
        namespace: &str,
    ) -> StepResult {
        let condition = self
            .scope
            .resolve_value(&spec.condition)
            .map_err(|e| failure(path, None, e))?;
        let (label, branch) = if is_truthy(&condition) {
            ("then", &spec.then_steps)
        } else {
            ("else", &spec.else_steps)
        };
        debug!(run_id = %self.run_id, step = %path, branch = label, "Conditional");
        let prefix = format!("{path}.{label}");
        self.run_steps(branch, &prefix, namespace).await
    }

    fn component(&self, path: &str, component_id: &str) -> std::result::Result<Arc<dyn Component>, RunFailure> {
        self.components.get(component_id).cloned().ok_or_else(|| {
            failure(
                path,
                Some(component_id),
                FlowError::UnknownComponent(component_id.to_string()),
            )
        })
    }

    fn emit(&self, event_type: &str, path: &str, component_id: &str, extra: Value) {
        let mut data = json!({
            "run_id": self.run_id,
            "step": path,
            "component_id": component_id,
        });
        if let (Some(data), Value::Object(extra)) = (data.as_object_mut(), extra) {
            data.extend(extra);
        }
        self.events.try_emit(event_type, Some(data));
    }

    /// Binds outputs and aliases in the current frame, then applies the
    /// invocation's buffered writes.
    fn apply(
        &mut self,
        component_id: &str,
        outputs: &Record,
        effects: Effects,
        aliases: &BTreeMap<String, String>,
    ) {
        self.scope.bind_output(component_id, outputs);
        for (field, alias) in aliases {
            let value = outputs.get(field).cloned().unwrap_or(Value::Null);
            self.scope.bind(alias.clone(), value);
        }
        for (name, value) in effects.bindings {
            self.scope.bind(name, value);
        }
        self.exports.extend(effects.returns);
    }

    /// Executes one invocation, racing it against cancellation.
    async fn call_component(
        &mut self,
        path: &str,
        kind: &'static str,
        component_id: &str,
        component: &dyn Component,
        invocation_kind: InvocationKind,
        inputs: &Record,
    ) -> std::result::Result<InvocationOutcome, RunFailure> {
        let policy = self.policies.get(component_id).cloned().unwrap_or_default();
        self.emit(events::STEP_STARTED, path, component_id, json!({"kind": kind}));

        let span = info_span!(
            "step",
            run_id = %self.run_id,
            step = %path,
            component_id = %component_id,
            kind
        );
        let invocation = Invocation {
            run_id: &self.run_id,
            step: path,
            component_id,
            component,
            kind: invocation_kind,
            inputs,
            policy: &policy,
        };
        let call = invoke(
            invocation,
            &self.scope,
            self.destinations,
            self.events,
            &mut self.attempts,
        )
        .instrument(span);

        let outcome = tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            outcome = call => Some(outcome),
        };
        let Some(outcome) = outcome else {
            let reason = self.token.reason().unwrap_or_default();
            warn!(run_id = %self.run_id, step = %path, reason = %reason, "Invocation cancelled");
            return Err(failure(path, Some(component_id), FlowError::Cancelled(reason)));
        };

        self.stats.components_executed += 1;
        self.stats.retries += u64::from(outcome.attempts().saturating_sub(1));
        Ok(outcome)
    }

    async fn commit(&mut self, record: CheckpointRecord, path: &str) -> StepResult {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let component_id = record.component_id.clone();
        let hash = record.hash.clone();
        let sequence = session
            .append(record)
            .await
            .map_err(|e| failure(path, Some(&component_id), e.into()))?;
        self.emit(
            events::CHECKPOINT_APPENDED,
            path,
            &component_id,
            json!({"hash": hash, "sequence": sequence}),
        );
        Ok(())
    }

    /// Runs a source or call step through the checkpoint fast path and the
    /// error policy machine.
    async fn run_component(
        &mut self,
        path: &str,
        kind: &'static str,
        component_id: &str,
        inputs: Record,
        aliases: &BTreeMap<String, String>,
        namespace: &str,
    ) -> StepResult {
        let component = self.component(path, component_id)?;
        let hash = self.session.as_ref().map(|_| {
            content_hash(
                component_id,
                &format!("{namespace}{path}"),
                &Value::Object(inputs.clone()),
            )
        });

        let replayed = match (self.session.as_mut(), hash.as_deref()) {
            (Some(session), Some(hash)) => session.lookup(hash),
            _ => None,
        };
        if let Some(record) = replayed {
            debug!(
                run_id = %self.run_id,
                step = %path,
                component_id = %component_id,
                hash = %record.hash,
                "Replaying checkpointed invocation"
            );
            component.replay(&record.inputs, &record.outputs);
            self.apply(component_id, &record.outputs, record.effects, aliases);
            let status = match record.status {
                RecordStatus::Completed => StepStatus::Completed,
                RecordStatus::Skipped => {
                    self.skipped.push(SkippedStep {
                        step: path.to_string(),
                        component_id: component_id.to_string(),
                        error: record.error.clone().unwrap_or_default(),
                    });
                    StepStatus::Skipped
                }
            };
            self.stats.checkpoint_hits += 1;
            self.reports.push(
                StepReport::new(path, component_id, kind, status, 0)
                    .with_hash(Some(record.hash.clone()))
                    .replayed(),
            );
            self.emit(
                events::CHECKPOINT_HIT,
                path,
                component_id,
                json!({"hash": record.hash}),
            );
            return Ok(());
        }

        let outcome = self
            .call_component(
                path,
                kind,
                component_id,
                component.as_ref(),
                InvocationKind::Execute,
                &inputs,
            )
            .await?;

        match outcome {
            InvocationOutcome::Completed {
                outputs,
                effects,
                attempts,
            } => {
                if let Some(hash) = &hash {
                    let record = CheckpointRecord::new(
                        hash.clone(),
                        component_id,
                        path,
                        inputs,
                        outputs.clone(),
                        RecordStatus::Completed,
                    )
                    .with_effects(effects.clone());
                    self.commit(record, path).await?;
                }
                self.apply(component_id, &outputs, effects, aliases);
                self.reports.push(
                    StepReport::new(path, component_id, kind, StepStatus::Completed, attempts)
                        .with_hash(hash),
                );
                self.emit(
                    events::STEP_COMPLETED,
                    path,
                    component_id,
                    json!({"attempts": attempts}),
                );
                Ok(())
            }
            InvocationOutcome::Skipped {
                outputs,
                error,
                attempts,
            } => {
                warn!(
                    run_id = %self.run_id,
                    step = %path,
                    component_id = %component_id,
                    error = %error,
                    "Skipping failed component"
                );
                if let Some(hash) = &hash {
                    let record = CheckpointRecord::new(
                        hash.clone(),
                        component_id,
                        path,
                        inputs,
                        outputs.clone(),
                        RecordStatus::Skipped,
                    )
                    .with_error(error.to_string());
                    self.commit(record, path).await?;
                }
                self.apply(component_id, &outputs, Effects::default(), aliases);
                self.skipped.push(SkippedStep {
                    step: path.to_string(),
                    component_id: component_id.to_string(),
                    error: error.to_string(),
                });
                self.stats.errors_recovered += 1;
                self.reports.push(
                    StepReport::new(path, component_id, kind, StepStatus::Skipped, attempts)
                        .with_hash(hash),
                );
                self.emit(
                    events::STEP_SKIPPED,
                    path,
                    component_id,
                    json!({"attempts": attempts, "error": error.to_string()}),
                );
                Ok(())
            }
            InvocationOutcome::Failed { error, attempts } => {
                self.reports.push(
                    StepReport::new(path, component_id, kind, StepStatus::Failed, attempts)
                        .with_hash(hash),
                );
                self.emit(
                    events::STEP_FAILED,
                    path,
                    component_id,
                    json!({"attempts": attempts, "error": error.to_string()}),
                );
                Err(failure(
                    path,
                    Some(component_id),
                    FlowError::ComponentInvocation {
                        step: path.to_string(),
                        component_id: component_id.to_string(),
                        inputs,
                        attempts,
                        source: error,
                    },
                ))
            }
        }
    }

    /// Finalizes an accumulator. Never checkpointed: on resume it re-runs
    /// over the state rebuilt by replay.
    async fn run_sink(
        &mut self,
        path: &str,
        component_id: &str,
        aliases: &BTreeMap<String, String>,
    ) -> StepResult {
        let component = self.component(path, component_id)?;
        let empty = Record::new();
        let outcome = self
            .call_component(
                path,
                "sink",
                component_id,
                component.as_ref(),
                InvocationKind::Finalize,
                &empty,
            )
            .await?;

        match outcome {
            InvocationOutcome::Completed {
                outputs,
                effects,
                attempts,
            } => {
                self.apply(component_id, &outputs, effects, aliases);
                self.scope.finalize(component_id);
                self.reports.push(StepReport::new(
                    path,
                    component_id,
                    "sink",
                    StepStatus::Completed,
                    attempts,
                ));
                self.emit(
                    events::STEP_COMPLETED,
                    path,
                    component_id,
                    json!({"attempts": attempts}),
                );
                Ok(())
            }
            InvocationOutcome::Skipped {
                outputs,
                error,
                attempts,
            } => {
                warn!(
                    run_id = %self.run_id,
                    step = %path,
                    component_id = %component_id,
                    error = %error,
                    "Skipping failed finalize"
                );
                self.apply(component_id, &outputs, Effects::default(), aliases);
                self.scope.finalize(component_id);
                self.skipped.push(SkippedStep {
                    step: path.to_string(),
                    component_id: component_id.to_string(),
                    error: error.to_string(),
                });
                self.stats.errors_recovered += 1;
                self.reports.push(StepReport::new(
                    path,
                    component_id,
                    "sink",
                    StepStatus::Skipped,
                    attempts,
                ));
                self.emit(
                    events::STEP_SKIPPED,
                    path,
                    component_id,
                    json!({"attempts": attempts, "error": error.to_string()}),
                );
                Ok(())
            }
            InvocationOutcome::Failed { error, attempts } => {
                self.reports.push(StepReport::new(
                    path,
                    component_id,
                    "sink",
                    StepStatus::Failed,
                    attempts,
                ));
                self.emit(
                    events::STEP_FAILED,
                    path,
                    component_id,
                    json!({"attempts": attempts, "error": error.to_string()}),
                );
                Err(failure(
                    path,
                    Some(component_id),
                    FlowError::ComponentInvocation {
                        step: path.to_string(),
                        component_id: component_id.to_string(),
                        inputs: empty,
                        attempts,
                        source: error,
                    },
                ))
            }
        }
    }
}
