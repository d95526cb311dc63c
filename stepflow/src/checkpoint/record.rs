//! Checkpoint records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::component::Effects;
use crate::core::Record;

/// The terminal outcome a record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// The call succeeded.
    Completed,
    /// The call failed and its policy produced a null-shaped output.
    Skipped,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One completed invocation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Content hash the record is indexed by.
    pub hash: String,
    /// The invoked component.
    pub component_id: String,
    /// Structural path of the invoking step.
    pub step: String,
    /// The resolved inputs.
    pub inputs: Record,
    /// The output record that was bound.
    pub outputs: Record,
    /// Buffered writes to replay with the outputs.
    #[serde(default, skip_serializing_if = "Effects::is_empty")]
    pub effects: Effects,
    /// Terminal outcome.
    pub status: RecordStatus,
    /// Why the call was skipped, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Position in the run's log.
    pub sequence: u64,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Creates a record. The sequence number is assigned on append.
    #[must_use]
    pub fn new(
        hash: impl Into<String>,
        component_id: impl Into<String>,
        step: impl Into<String>,
        inputs: Record,
        outputs: Record,
        status: RecordStatus,
    ) -> Self {
        Self {
            hash: hash.into(),
            component_id: component_id.into(),
            step: step.into(),
            inputs,
            outputs,
            effects: Effects::default(),
            status,
            error: None,
            sequence: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Sets the buffered writes to replay.
    #[must_use]
    pub fn with_effects(mut self, effects: Effects) -> Self {
        self.effects = effects;
        self
    }

    /// Sets the skip reason.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
