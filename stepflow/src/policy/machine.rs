//! Runs one component invocation under its resolved error policy.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{should_retry, ErrorPolicy, PolicyKind, RetryDecision, RetryState};
use crate::component::{Component, ComponentContext, DestinationWriter, Effects};
use crate::core::Record;
use crate::errors::ComponentError;
use crate::events::{EventSink, STEP_RETRY};
use crate::observability::SpanTimer;
use crate::scope::Scope;

/// Which component entry point an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// `execute` with resolved inputs.
    Execute,
    /// `finalize`, for sink steps.
    Finalize,
}

/// One call to make.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Run the call belongs to.
    pub run_id: &'a str,
    /// Structural path of the step.
    pub step: &'a str,
    /// Component id being invoked.
    pub component_id: &'a str,
    /// The component instance.
    pub component: &'a dyn Component,
    /// Entry point to call.
    pub kind: InvocationKind,
    /// Resolved inputs. Ignored for [`InvocationKind::Finalize`].
    pub inputs: &'a Record,
    /// Policy governing failures.
    pub policy: &'a ErrorPolicy,
}

/// Terminal result of an invocation.
#[derive(Debug)]
pub enum InvocationOutcome {
    /// Some attempt succeeded.
    Completed {
        /// The component's output record.
        outputs: Record,
        /// Buffered writes of the successful attempt.
        effects: Effects,
        /// Attempts made.
        attempts: u32,
    },
    /// Every attempt failed and the policy is `skip`.
    Skipped {
        /// Null-shaped output record.
        outputs: Record,
        /// The last failure.
        error: ComponentError,
        /// Attempts made.
        attempts: u32,
    },
    /// Every attempt failed and the policy did not recover.
    Failed {
        /// The last failure.
        error: ComponentError,
        /// Attempts made.
        attempts: u32,
    },
}

impl InvocationOutcome {
    /// Number of attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. }
            | Self::Skipped { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// One attempt at an invocation, kept for the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Structural path of the step.
    pub step: String,
    /// Component id.
    pub component_id: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Whether the attempt succeeded.
    pub succeeded: bool,
    /// Failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration.
    pub duration_ms: f64,
}

/// Invokes a component until it succeeds or its policy gives up.
///
/// Inputs failing the component's own validation count as a permanent
/// failure: they are never retried, though `skip` still applies. Every
/// attempt is appended to `attempts`.
pub async fn invoke(
    invocation: Invocation<'_>,
    scope: &Scope,
    destinations: &dyn DestinationWriter,
    events: &dyn EventSink,
    attempts: &mut Vec<AttemptRecord>,
) -> InvocationOutcome {
    let Invocation {
        run_id,
        step,
        component_id,
        component,
        kind,
        inputs,
        policy,
    } = invocation;

    let manifest = component.describe();
    let inputs = manifest.apply_input_defaults(inputs);
    let mut state = RetryState::new();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let timer = SpanTimer::start();
        let mut ctx = ComponentContext::new(component_id, step, scope, destinations);

        let result = match kind {
            InvocationKind::Execute => {
                let validation = component.validate(&inputs);
                for warning in &validation.warnings {
                    debug!(step = %step, component_id = %component_id, "{}", warning);
                }
                if validation.valid {
                    component.execute(&inputs, &mut ctx).await
                } else {
                    Err(ComponentError::permanent(format!(
                        "invalid inputs: {}",
                        validation.errors.join("; ")
                    )))
                }
            }
            InvocationKind::Finalize => component.finalize(&mut ctx).await,
        };
        let duration_ms = timer.finish();

        let error = match result {
            Ok(outputs) => {
                attempts.push(AttemptRecord {
                    step: step.to_string(),
                    component_id: component_id.to_string(),
                    attempt,
                    succeeded: true,
                    error: None,
                    duration_ms,
                });
                return InvocationOutcome::Completed {
                    outputs,
                    effects: ctx.into_effects(),
                    attempts: attempt,
                };
            }
            Err(error) => error,
        };

        attempts.push(AttemptRecord {
            step: step.to_string(),
            component_id: component_id.to_string(),
            attempt,
            succeeded: false,
            error: Some(error.to_string()),
            duration_ms,
        });
        warn!(
            run_id = %run_id,
            step = %step,
            component_id = %component_id,
            attempt,
            policy = %policy.kind,
            error = %error,
            "Component attempt failed"
        );

        if policy.kind == PolicyKind::Retry {
            if let RetryDecision::Retry(delay) =
                should_retry(&mut state, &policy.retry, error.permanent)
            {
                events.try_emit(
                    STEP_RETRY,
                    Some(json!({
                        "run_id": run_id,
                        "step": step,
                        "component_id": component_id,
                        "attempt": attempt,
                        "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "error": error.to_string(),
                    })),
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        }

        return match policy.kind {
            PolicyKind::Skip => InvocationOutcome::Skipped {
                outputs: manifest.null_outputs(),
                error,
                attempts: attempt,
            },
            PolicyKind::Fail | PolicyKind::Retry => InvocationOutcome::Failed {
                error,
                attempts: attempt,
            },
        };
    }
}
