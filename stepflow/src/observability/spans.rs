//! Wall-clock timing for runs and attempts.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Times one run or attempt.
///
/// The monotonic clock measures the duration; the start timestamp is kept
/// for reports.
#[derive(Debug, Clone, Copy)]
pub struct SpanTimer {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SpanTimer {
    /// Starts timing now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// When timing started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Milliseconds since the start.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Stops timing and returns the duration in milliseconds.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}
