//! End-to-end tests for flow execution.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::checkpoint::{InMemoryCheckpointLog, JsonlCheckpointLog};
    use crate::component::{ComponentCategory, ComponentManifest, ComponentRegistry, ComponentSet};
    use crate::components::CollectorSink;
    use crate::core::{Record, RunStatus, StepStatus};
    use crate::engine::{FlowEngine, RunOptions};
    use crate::errors::FlowError;
    use crate::events::{self, CollectingEventSink};
    use crate::flow::FlowProgram;
    use crate::testing::{CountingComponent, FlakyComponent, SlowComponent};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    const DOUBLING_FLOW: &str = r#"{
        "name": "doubling",
        "flow": [
            {"source": "numbers"},
            {"loop": {"over": "{numbers.items}", "as": "n", "steps": [
                {"call": "double", "inputs": {"n": "{n}"}},
                {"call": "results", "inputs": {"value": "{double.value}"}}
            ]}},
            {"sink": "results"}
        ]
    }"#;

    struct Doubling {
        numbers: Arc<CountingComponent>,
        double: Arc<CountingComponent>,
        components: ComponentSet,
    }

    fn doubling(items: Value, double: CountingComponent) -> Doubling {
        let numbers = Arc::new(CountingComponent::source(items));
        let double = Arc::new(double);
        let components = ComponentSet::new()
            .with("numbers", numbers.clone())
            .with("double", double.clone())
            .with("results", Arc::new(CollectorSink::new("results", Record::new())));
        Doubling {
            numbers,
            double,
            components,
        }
    }

    fn recorder() -> Arc<CountingComponent> {
        Arc::new(CountingComponent::new(
            ComponentManifest::new("test/recorder", ComponentCategory::Transform),
            |_| Ok(Record::new()),
        ))
    }

    fn engine() -> FlowEngine {
        FlowEngine::new(ComponentRegistry::new())
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[tokio::test]
    async fn test_loop_doubles_and_collects_in_order() {
        let program = FlowProgram::from_json(DOUBLING_FLOW).unwrap();
        let setup = doubling(json!([1, 2, 3]), CountingComponent::doubler());

        let result = engine()
            .run_with_components(&program, &Record::new(), setup.components, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(
            result.exports["results"],
            json!({"items": [{"value": 2}, {"value": 4}, {"value": 6}], "count": 3})
        );
        let values: Vec<i64> = result.exports["results"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|item| item["value"].as_i64())
            .collect();
        assert_eq!(values, vec![2, 4, 6]);
        assert_eq!(result.output("results").unwrap()["count"], json!(3));
        assert_eq!(setup.double.calls(), 3);
        assert_eq!(result.stats.components_executed, 8);
    }

    #[tokio::test]
    async fn test_reading_collector_before_sink_fails() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "early-read",
                "flow": [
                    {"source": "numbers"},
                    {"loop": {"over": "{numbers.items}", "as": "n", "steps": [
                        {"call": "results", "inputs": {"n": "{n}"}},
                        {"call": "recorder", "inputs": {"seen": "{results.count}"}}
                    ]}},
                    {"sink": "results"}
                ]
            }"#,
        )
        .unwrap();
        let components = ComponentSet::new()
            .with("numbers", Arc::new(CountingComponent::source(json!([1, 2]))))
            .with("results", Arc::new(CollectorSink::new("results", Record::new())))
            .with("recorder", recorder());

        let result = engine()
            .run_with_components(&program, &Record::new(), components, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.step.as_deref(), Some("flow[1].steps[1]"));
        assert!(matches!(
            &failure.error,
            FlowError::NotFinalized { component_id } if component_id == "results"
        ));
    }

    #[tokio::test]
    async fn test_collector_readable_after_sink() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "late-read",
                "flow": [
                    {"source": "numbers"},
                    {"loop": {"over": "{numbers.items}", "as": "n", "steps": [
                        {"call": "results", "inputs": {"n": "{n}"}}
                    ]}},
                    {"sink": "results", "outputs": {"items": "all_items"}},
                    {"call": "recorder", "inputs": {"count": "{results.count}", "items": "{all_items}"}}
                ]
            }"#,
        )
        .unwrap();
        let recorder = recorder();
        let components = ComponentSet::new()
            .with("numbers", Arc::new(CountingComponent::source(json!([5, 6]))))
            .with("results", Arc::new(CollectorSink::new("results", Record::new())))
            .with("recorder", recorder.clone());

        let result = engine()
            .run_with_components(&program, &Record::new(), components, RunOptions::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(
            recorder.recorded_inputs(),
            vec![record(json!({"count": 2, "items": [{"n": 5}, {"n": 6}]}))]
        );
    }

    #[tokio::test]
    async fn test_resume_replays_without_invoking() {
        let program = FlowProgram::from_json(DOUBLING_FLOW).unwrap();
        let log = Arc::new(InMemoryCheckpointLog::new());
        let engine = engine().with_checkpoint_log(log.clone());

        let first = doubling(json!([1, 2, 3]), CountingComponent::doubler());
        let original = engine
            .run_with_components(
                &program,
                &Record::new(),
                first.components,
                RunOptions::new().with_run_id("R"),
            )
            .await
            .unwrap();
        assert_eq!(original.stats.checkpoint_appends, 7);
        assert_eq!(log.len("R"), 7);

        let second = doubling(json!([1, 2, 3]), CountingComponent::doubler());
        let resumed = engine
            .run_with_components(
                &program,
                &Record::new(),
                second.components,
                RunOptions::new().with_run_id("R"),
            )
            .await
            .unwrap();

        assert_eq!(second.numbers.calls(), 0);
        assert_eq!(second.double.calls(), 0);
        assert_eq!(resumed.stats.checkpoint_hits, 7);
        assert_eq!(resumed.stats.checkpoint_appends, 0);
        assert_eq!(log.len("R"), 7);
        assert_eq!(
            serde_json::to_string(&resumed.exports).unwrap(),
            serde_json::to_string(&original.exports).unwrap()
        );
        assert!(resumed
            .reports
            .iter()
            .filter(|r| r.kind != "sink")
            .all(|r| r.from_checkpoint && r.attempts == 0));
    }

    #[tokio::test]
    async fn test_interrupted_run_resumes_forward() {
        let program = FlowProgram::from_json(DOUBLING_FLOW).unwrap();
        let log = Arc::new(InMemoryCheckpointLog::new());
        let engine = engine().with_checkpoint_log(log.clone());
        let options = || RunOptions::new().with_run_id("crash");

        let first = doubling(
            json!([1, 2, 3, 4]),
            CountingComponent::doubler().failing_on(json!(3)),
        );
        let crashed = engine
            .run_with_components(&program, &Record::new(), first.components, options())
            .await
            .unwrap();
        assert_eq!(crashed.status, RunStatus::Failed);
        assert!(matches!(
            crashed.error(),
            Some(FlowError::ComponentInvocation { attempts: 1, .. })
        ));

        let second = doubling(json!([1, 2, 3, 4]), CountingComponent::doubler());
        let resumed = engine
            .run_with_components(&program, &Record::new(), second.components, options())
            .await
            .unwrap();

        assert_eq!(resumed.status, RunStatus::Completed);
        assert_eq!(
            second.double.recorded_inputs(),
            vec![record(json!({"n": 3})), record(json!({"n": 4}))]
        );
        assert_eq!(resumed.exports["results"]["count"], json!(4));
        assert_eq!(
            resumed.exports["results"]["items"][3],
            json!({"value": 8})
        );
    }

    #[tokio::test]
    async fn test_inner_loop_variable_shadows_outer() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "shadowing",
                "flow": [
                    {"loop": {"over": [1, 2], "as": "x", "steps": [
                        {"loop": {"over": ["a"], "as": "x", "steps": [
                            {"call": "inner", "inputs": {"x": "{x}"}}
                        ]}},
                        {"call": "outer", "inputs": {"x": "{x}"}}
                    ]}}
                ]
            }"#,
        )
        .unwrap();
        let inner = recorder();
        let outer = recorder();
        let components = ComponentSet::new()
            .with("inner", inner.clone())
            .with("outer", outer.clone());

        let result = engine()
            .run_with_components(&program, &Record::new(), components, RunOptions::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(
            inner.recorded_inputs(),
            vec![record(json!({"x": "a"})), record(json!({"x": "a"}))]
        );
        assert_eq!(
            outer.recorded_inputs(),
            vec![record(json!({"x": 1})), record(json!({"x": 2}))]
        );
        assert!(!result.bindings.contains_key("x"));
    }

    #[tokio::test]
    async fn test_bare_loop_source_is_a_path() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "bare-over",
                "flow": [
                    {"source": "numbers"},
                    {"loop": {"over": "numbers.items", "steps": [
                        {"call": "each", "inputs": {"n": "{item}"}}
                    ]}}
                ]
            }"#,
        )
        .unwrap();
        let each = recorder();
        let components = ComponentSet::new()
            .with("numbers", Arc::new(CountingComponent::source(json!([1, 2]))))
            .with("each", each.clone());

        let result = engine()
            .run_with_components(&program, &Record::new(), components, RunOptions::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(
            each.recorded_inputs(),
            vec![record(json!({"n": 1})), record(json!({"n": 2}))]
        );
    }

    #[tokio::test]
    async fn test_loop_over_scalar_is_invalid_iterable() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "scalar-over",
                "flow": [
                    {"call": "double", "inputs": {"n": 2}},
                    {"loop": {"over": "double.value", "steps": []}}
                ]
            }"#,
        )
        .unwrap();
        let components = ComponentSet::new().with("double", Arc::new(CountingComponent::doubler()));

        let result = engine()
            .run_with_components(&program, &Record::new(), components, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        assert!(matches!(
            &result.failure.as_ref().unwrap().error,
            FlowError::InvalidIterable { expression, found } if expression == "double.value" && found == "number"
        ));
    }

    #[tokio::test]
    async fn test_input_text_with_braces_is_not_resolved_again() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "echo",
                "inputs": {"greeting": "string"},
                "flow": [
                    {"call": "double", "inputs": {"n": 1}, "outputs": {"value": "user"}},
                    {"call": "echo", "inputs": {"text": "{$inputs.greeting}", "line": "> {$inputs.greeting} #{user}"}}
                ]
            }"#,
        )
        .unwrap();
        let echo = recorder();
        let components = ComponentSet::new()
            .with("double", Arc::new(CountingComponent::doubler()))
            .with("echo", echo.clone());
        let inputs = record(json!({"greeting": "hi {user}"}));

        let result = engine()
            .run_with_components(&program, &inputs, components, RunOptions::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(
            echo.recorded_inputs(),
            vec![record(json!({"text": "hi {user}", "line": "> hi {user} #2"}))]
        );
    }

    #[tokio::test]
    async fn test_retry_records_every_attempt_but_one_checkpoint() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "retrying",
                "components": {
                    "flaky": {"type": "test/flaky", "on_error": "retry", "max_retries": 2, "retry_delay_ms": 1}
                },
                "flow": [{"source": "flaky"}]
            }"#,
        )
        .unwrap();
        let flaky = Arc::new(FlakyComponent::new(2));
        let log = Arc::new(InMemoryCheckpointLog::new());
        let sink = Arc::new(CollectingEventSink::new());

        let result = engine()
            .with_checkpoint_log(log.clone())
            .with_event_sink(sink.clone())
            .run_with_components(
                &program,
                &Record::new(),
                ComponentSet::new().with("flaky", flaky.clone()),
                RunOptions::new().with_run_id("retry-run"),
            )
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(result.stats.retries, 2);
        assert_eq!(result.reports[0].attempts, 3);
        assert_eq!(result.output("flaky").unwrap()["value"], json!(3));
        assert_eq!(log.len("retry-run"), 1);
        assert_eq!(sink.count(events::STEP_RETRY), 2);
        assert_eq!(sink.count(events::CHECKPOINT_APPENDED), 1);
    }

    #[tokio::test]
    async fn test_skip_yields_null_shape_and_continues() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "skipping",
                "error_handling": {"on_error": "skip"},
                "flow": [
                    {"source": "flaky"},
                    {"call": "after", "inputs": {"v": "{flaky.value}"}}
                ]
            }"#,
        )
        .unwrap();
        let after = recorder();
        let components = ComponentSet::new()
            .with("flaky", Arc::new(FlakyComponent::new(5)))
            .with("after", after.clone());

        let result = engine()
            .run_with_components(&program, &Record::new(), components, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::PartiallySkipped);
        assert!(result.is_success());
        assert_eq!(result.reports[0].status, StepStatus::Skipped);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].component_id, "flaky");
        assert_eq!(
            result.output("flaky").unwrap(),
            &record(json!({"value": null, "label": null}))
        );
        assert_eq!(after.recorded_inputs(), vec![record(json!({"v": null}))]);
        assert_eq!(result.stats.errors_recovered, 1);
    }

    #[tokio::test]
    async fn test_unresolved_reference_names_root() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "unresolved",
                "flow": [{"call": "recorder", "inputs": {"v": "{nope.field}"}}]
            }"#,
        )
        .unwrap();
        let recorder = recorder();

        let result = engine()
            .run_with_components(
                &program,
                &Record::new(),
                ComponentSet::new().with("recorder", recorder.clone()),
                RunOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        match result.error() {
            Some(FlowError::UnresolvedReference { name, .. }) => assert_eq!(name, "nope"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_invocation_is_not_checkpointed() {
        let program = FlowProgram::from_json(
            r#"{"name": "slow", "flow": [{"source": "slow"}, {"source": "never"}]}"#,
        )
        .unwrap();
        let slow = Arc::new(SlowComponent::new(Duration::from_secs(10)));
        let never = recorder();
        let log = Arc::new(InMemoryCheckpointLog::new());
        let token = Arc::new(CancellationToken::new());

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel("operator stop");
            })
        };

        let result = engine()
            .with_checkpoint_log(log.clone())
            .run_with_components(
                &program,
                &Record::new(),
                ComponentSet::new()
                    .with("slow", slow.clone())
                    .with("never", never.clone()),
                RunOptions::new()
                    .with_run_id("cancelled")
                    .with_cancellation(token),
            )
            .await
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        assert!(matches!(
            result.error(),
            Some(FlowError::Cancelled(reason)) if reason == "operator stop"
        ));
        assert_eq!(slow.calls(), 1);
        assert_eq!(never.calls(), 0);
        assert_eq!(log.len("cancelled"), 0);
    }

    #[tokio::test]
    async fn test_timeout_cancels_run() {
        let program =
            FlowProgram::from_json(r#"{"name": "slow", "flow": [{"source": "slow"}]}"#).unwrap();

        let result = engine()
            .run_with_components(
                &program,
                &Record::new(),
                ComponentSet::new()
                    .with("slow", Arc::new(SlowComponent::new(Duration::from_secs(10)))),
                RunOptions::new().with_timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap();

        assert!(matches!(
            result.error(),
            Some(FlowError::Cancelled(reason)) if reason == "timeout"
        ));
    }

    #[tokio::test]
    async fn test_conditional_and_aliases() {
        let program = FlowProgram::from_json(
            r#"{
                "name": "branching",
                "inputs": {"flag": "boolean"},
                "flow": [
                    {"call": "double", "inputs": {"n": 21}, "outputs": {"value": "answer"}},
                    {"conditional": {
                        "if": "{$inputs.flag}",
                        "then": [{"call": "yes", "inputs": {"answer": "{answer}"}}],
                        "else": [{"call": "no", "inputs": {"answer": "{answer}"}}]
                    }}
                ]
            }"#,
        )
        .unwrap();

        for flag in [true, false] {
            let yes = recorder();
            let no = recorder();
            let components = ComponentSet::new()
                .with("double", Arc::new(CountingComponent::doubler()))
                .with("yes", yes.clone())
                .with("no", no.clone());
            let inputs = record(json!({"flag": flag}));

            let result = engine()
                .run_with_components(&program, &inputs, components, RunOptions::new())
                .await
                .unwrap();

            assert!(result.is_success());
            let taken = if flag { &yes } else { &no };
            let other = if flag { &no } else { &yes };
            assert_eq!(taken.recorded_inputs(), vec![record(json!({"answer": 42}))]);
            assert_eq!(other.calls(), 0);
            assert_eq!(result.bindings["answer"], json!(42));
        }
    }

    #[tokio::test]
    async fn test_missing_component_is_rejected_before_running() {
        let program = FlowProgram::from_json(DOUBLING_FLOW).unwrap();
        let err = engine()
            .run_with_components(&program, &Record::new(), ComponentSet::new(), RunOptions::new())
            .await
            .unwrap_err();

        match err {
            FlowError::Validation(validation) => assert_eq!(validation.problems.len(), 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    const GREETING_FLOW: &str = r#"{
        "name": "greetings",
        "inputs": {"greeting": {"type": "string", "default": "Hello"}},
        "components": {
            "names": {"type": "source/literal", "config": {"value": ["Ada", "Grace"]}},
            "greet": {"type": "transform/template", "config": {"template": "{$inputs.greeting}, {name}!"}},
            "results": {"type": "sink/collector", "config": {"fields": ["result"]}}
        },
        "flow": [
            {"source": "names"},
            {"loop": {"over": "{names.items}", "as": "name", "steps": [
                {"call": "greet", "inputs": {"name": "{name}"}},
                {"call": "results", "inputs": {"result": "{greet.result}"}}
            ]}},
            {"sink": "results"}
        ]
    }"#;

    #[tokio::test]
    async fn test_builtin_flow_resumes_from_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let program = FlowProgram::from_json(GREETING_FLOW).unwrap();
        let engine = FlowEngine::with_builtins()
            .unwrap()
            .with_checkpoint_log(Arc::new(JsonlCheckpointLog::new(dir.path())));
        let inputs = record(json!({"greeting": "Hi"}));

        let first = engine
            .run(&program, &inputs, RunOptions::new().with_run_id("greet-1"))
            .await
            .unwrap();
        assert_eq!(first.status, RunStatus::Completed);
        assert_eq!(
            first.exports["results"],
            json!({"items": [{"result": "Hi, Ada!"}, {"result": "Hi, Grace!"}], "count": 2})
        );
        assert!(dir.path().join("greet-1.jsonl").exists());

        let second = engine
            .run(&program, &inputs, RunOptions::new().with_run_id("greet-1"))
            .await
            .unwrap();
        assert_eq!(second.exports, first.exports);
        assert_eq!(second.stats.checkpoint_hits, 5);
        assert_eq!(second.stats.components_executed, 1);

        let fresh = engine
            .run(&program, &Record::new(), RunOptions::new().with_run_id("greet-2"))
            .await
            .unwrap();
        assert_eq!(fresh.exports["results"]["items"][0], json!({"result": "Hello, Ada!"}));
        assert_eq!(fresh.stats.checkpoint_hits, 0);
    }

    #[tokio::test]
    async fn test_run_events() {
        let program = FlowProgram::from_json(DOUBLING_FLOW).unwrap();
        let setup = doubling(json!([1]), CountingComponent::doubler());
        let sink = Arc::new(CollectingEventSink::new());

        engine()
            .with_event_sink(sink.clone())
            .run_with_components(&program, &Record::new(), setup.components, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(sink.count(events::RUN_STARTED), 1);
        assert_eq!(sink.count(events::STEP_STARTED), 4);
        assert_eq!(sink.count(events::STEP_COMPLETED), 4);
        assert_eq!(sink.count(events::RUN_COMPLETED), 1);
        assert!(sink.events_of_type("checkpoint.").is_empty());
    }
}
