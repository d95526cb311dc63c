//! The in-memory index a resumable run consults.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::record::CheckpointRecord;
use super::store::CheckpointLog;
use crate::errors::CheckpointError;

/// A run's view of its checkpoint log: the hash index plus the writer.
pub struct CheckpointSession {
    run_id: String,
    log: Arc<dyn CheckpointLog>,
    index: HashMap<String, CheckpointRecord>,
    next_sequence: u64,
    loaded: usize,
    hits: u64,
    appends: u64,
}

impl CheckpointSession {
    /// Loads every record for `run_id` and builds the hash index.
    pub async fn open(
        log: Arc<dyn CheckpointLog>,
        run_id: impl Into<String>,
    ) -> Result<Self, CheckpointError> {
        let run_id = run_id.into();
        let records = log.load(&run_id).await?;
        let loaded = records.len();
        let next_sequence = records
            .iter()
            .map(|r| r.sequence + 1)
            .max()
            .unwrap_or(0);

        let mut index = HashMap::with_capacity(loaded);
        for record in records {
            index.entry(record.hash.clone()).or_insert(record);
        }

        if loaded > 0 {
            info!(run_id = %run_id, records = loaded, "Loaded checkpoint log");
        }

        Ok(Self {
            run_id,
            log,
            index,
            next_sequence,
            loaded,
            hits: 0,
            appends: 0,
        })
    }

    /// The run id this session writes to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Records loaded when the session opened.
    #[must_use]
    pub const fn loaded(&self) -> usize {
        self.loaded
    }

    /// Lookups that found a record.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Records appended by this session.
    #[must_use]
    pub const fn appends(&self) -> u64 {
        self.appends
    }

    /// Returns true if the index holds a record for the hash.
    #[must_use]
    pub fn contains(&self, hash: &str) -> bool {
        self.index.contains_key(hash)
    }

    /// Looks up a completed invocation.
    pub fn lookup(&mut self, hash: &str) -> Option<CheckpointRecord> {
        let record = self.index.get(hash).cloned();
        if record.is_some() {
            self.hits += 1;
        }
        record
    }

    /// Assigns the next sequence number, appends durably, then indexes.
    pub async fn append(&mut self, mut record: CheckpointRecord) -> Result<u64, CheckpointError> {
        record.sequence = self.next_sequence;
        self.log.append(&self.run_id, &record).await?;

        let sequence = record.sequence;
        debug!(
            run_id = %self.run_id,
            hash = %record.hash,
            component_id = %record.component_id,
            sequence,
            "Appended checkpoint"
        );
        self.next_sequence += 1;
        self.appends += 1;
        self.index.insert(record.hash.clone(), record);
        Ok(sequence)
    }
}

impl std::fmt::Debug for CheckpointSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointSession")
            .field("run_id", &self.run_id)
            .field("indexed", &self.index.len())
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}
