//! # Stepflow
//!
//! A declarative flow execution engine with content-addressed checkpointing.
//!
//! A flow is a JSON document naming components and an ordered step program
//! over them:
//!
//! - **Components**: typed units of work behind one contract (describe,
//!   validate, execute, finalize), built from a registry of factories
//! - **Steps**: `source`, `call`, `loop`, `sink`, and `conditional`, with
//!   `{x.y.z}` references resolved against a scope of nested frames
//! - **Error policies**: `fail`, `retry` with backoff, or `skip` with
//!   null-shaped outputs, resolved per component
//! - **Checkpoints**: every terminal invocation is recorded under a hash of
//!   its identity and inputs, so re-running a run id replays finished work
//!   instead of repeating it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepflow::prelude::*;
//!
//! let program = FlowProgram::from_json(&std::fs::read_to_string("flow.json")?)?;
//! let engine = FlowEngine::with_builtins()?.with_jsonl_checkpoints();
//!
//! let result = engine
//!     .run(&program, &Record::new(), RunOptions::new().with_run_id("nightly"))
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&result.exports)?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod checkpoint;
pub mod component;
pub mod components;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod flow;
pub mod observability;
pub mod policy;
pub mod scope;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::checkpoint::{
        CheckpointLog, CheckpointRecord, InMemoryCheckpointLog, JsonlCheckpointLog,
    };
    pub use crate::component::{
        Component, ComponentCategory, ComponentContext, ComponentManifest, ComponentRegistry,
        ComponentSet, FieldSpec, FnComponent,
    };
    pub use crate::core::{Record, RunStatus, StepStatus, ValueType};
    pub use crate::engine::{EngineConfig, FlowEngine, RunOptions, RunResult};
    pub use crate::errors::{ComponentError, FlowError, FlowValidationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::flow::{ComponentDecl, FlowProgram, Step};
    pub use crate::policy::{ErrorHandling, ErrorPolicy, PolicyKind};
}
