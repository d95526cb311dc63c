//! Run lifecycle events.
//!
//! The interpreter reports progress through an [`EventSink`]. Events are a
//! dotted type name plus an optional JSON payload.

mod sink;

pub use sink::{CollectedEvent, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A run began executing.
pub const RUN_STARTED: &str = "run.started";
/// A run reached a terminal status.
pub const RUN_COMPLETED: &str = "run.completed";
/// A run stopped on a failure.
pub const RUN_FAILED: &str = "run.failed";
/// A run was cancelled.
pub const RUN_CANCELLED: &str = "run.cancelled";
/// A component step is about to execute.
pub const STEP_STARTED: &str = "step.started";
/// A component step completed.
pub const STEP_COMPLETED: &str = "step.completed";
/// A component step was skipped by its error policy.
pub const STEP_SKIPPED: &str = "step.skipped";
/// A component step failed for good.
pub const STEP_FAILED: &str = "step.failed";
/// A component step will be retried.
pub const STEP_RETRY: &str = "step.retry";
/// An invocation was satisfied from the checkpoint log.
pub const CHECKPOINT_HIT: &str = "checkpoint.hit";
/// An invocation's record was appended to the checkpoint log.
pub const CHECKPOINT_APPENDED: &str = "checkpoint.appended";
