//! Flow execution.
//!
//! [`FlowEngine`] binds a program's inputs, instantiates its components and
//! walks the step list. Every component call passes through the checkpoint
//! fast path (when a log is configured) and then the error policy machine.

mod config;
mod integration_tests;
mod interpreter;
mod result;

pub use config::{EngineConfig, RunOptions};
pub use interpreter::FlowEngine;
pub use result::{RunFailure, RunResult, RunStats, SkippedStep, StepReport};
