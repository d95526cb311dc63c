//! Core domain model types for stepflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The [`Record`] value shape shared by inputs, outputs and bindings
//! - Step and run status enums
//! - Declared value types

mod record;
mod status;
mod value_type;

pub use record::{null_record, Record};
pub use status::{RunStatus, StepStatus};
pub use value_type::ValueType;
