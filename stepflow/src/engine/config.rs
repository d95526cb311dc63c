//! Engine and per-run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::policy::{BackoffStrategy, JitterStrategy, RetryConfig};

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("runs")
}

/// Settings shared by every run of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retries under `retry` when no rule sets `max_retries`.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Base delay between retries when no rule sets one.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Upper bound on any single retry delay.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// How the delay grows between retries.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Randomization applied to each delay.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// Base directory for `file` destination writes.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding JSONL checkpoint logs.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    /// Run-level timeout applied when a run sets none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
            output_dir: default_output_dir(),
            checkpoint_dir: default_checkpoint_dir(),
            timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default retry limit.
    #[must_use]
    pub const fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    /// Sets the default base retry delay.
    #[must_use]
    pub const fn with_retry_base_delay_ms(mut self, delay: u64) -> Self {
        self.retry_base_delay_ms = delay;
        self
    }

    /// Sets the retry delay cap.
    #[must_use]
    pub const fn with_retry_max_delay_ms(mut self, delay: u64) -> Self {
        self.retry_max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the destination output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the checkpoint directory.
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Sets the default run timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = Some(timeout);
        self
    }

    /// The retry timing every policy starts from.
    #[must_use]
    pub fn retry_defaults(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.default_max_retries)
            .with_base_delay_ms(self.retry_base_delay_ms)
            .with_max_delay_ms(self.retry_max_delay_ms)
            .with_backoff(self.backoff)
            .with_jitter(self.jitter)
    }
}

/// Options for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run id. Reusing an id resumes that run; a fresh one is generated
    /// when unset.
    pub run_id: Option<String>,
    /// External stop signal.
    pub cancellation: Option<Arc<CancellationToken>>,
    /// Overrides the engine's timeout.
    pub timeout: Option<Duration>,
}

impl RunOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Sets an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Sets the run timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
