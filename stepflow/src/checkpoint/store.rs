//! Checkpoint log backends.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::warn;

use super::record::CheckpointRecord;
use crate::errors::CheckpointError;

/// Append-only storage for checkpoint records, one stream per run id.
///
/// Implementations must return records in append order. One writer per
/// run id is assumed.
#[async_trait]
pub trait CheckpointLog: Send + Sync {
    /// Reads every record for a run. A run with no log yields no records.
    async fn load(&self, run_id: &str) -> Result<Vec<CheckpointRecord>, CheckpointError>;

    /// Durably appends one record.
    async fn append(&self, run_id: &str, record: &CheckpointRecord) -> Result<(), CheckpointError>;
}

/// Keeps logs in memory. Useful for tests and single-process resumes.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointLog {
    runs: Mutex<HashMap<String, Vec<CheckpointRecord>>>,
}

impl InMemoryCheckpointLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records for a run.
    #[must_use]
    pub fn records(&self, run_id: &str) -> Vec<CheckpointRecord> {
        self.runs.lock().get(run_id).cloned().unwrap_or_default()
    }

    /// Returns the number of records for a run.
    #[must_use]
    pub fn len(&self, run_id: &str) -> usize {
        self.runs.lock().get(run_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl CheckpointLog for InMemoryCheckpointLog {
    async fn load(&self, run_id: &str) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        Ok(self.records(run_id))
    }

    async fn append(&self, run_id: &str, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        self.runs
            .lock()
            .entry(run_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}

/// Writes each run's log as JSON lines at `<dir>/<run_id>.jsonl`.
///
/// Every append is flushed and synced before it returns. Lines that fail
/// to parse on load, such as a line torn by a crash mid-write, are skipped.
#[derive(Debug, Clone)]
pub struct JsonlCheckpointLog {
    dir: PathBuf,
}

impl JsonlCheckpointLog {
    /// Creates a log rooted at `dir`. The directory is created on first append.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the log file for a run.
    pub fn path_for(&self, run_id: &str) -> Result<PathBuf, CheckpointError> {
        if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.starts_with('.') {
            return Err(CheckpointError::Storage(format!(
                "invalid run id '{run_id}'"
            )));
        }
        Ok(self.dir.join(format!("{run_id}.jsonl")))
    }
}

#[async_trait]
impl CheckpointLog for JsonlCheckpointLog {
    async fn load(&self, run_id: &str) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        let path = self.path_for(run_id)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CheckpointError::Storage(e.to_string())),
        };

        let mut records = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckpointRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    run_id = %run_id,
                    line = line_no + 1,
                    error = %e,
                    "Skipping unreadable checkpoint record"
                ),
            }
        }
        Ok(records)
    }

    async fn append(&self, run_id: &str, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        let path = self.path_for(run_id)?;
        let mut line = serde_json::to_string(record)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        line.push('\n');

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        // A torn tail from an interrupted write must not swallow this record.
        if ends_mid_line(&mut file)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
        {
            warn!(run_id = %run_id, "Checkpoint log ends mid-line, starting a new line");
            line.insert(0, '\n');
        }

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        file.sync_data()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        Ok(())
    }
}

async fn ends_mid_line(file: &mut tokio::fs::File) -> std::io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}
