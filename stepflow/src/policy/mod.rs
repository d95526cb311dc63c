//! Error policy machine.
//!
//! Every component invocation runs under one [`ErrorPolicy`]:
//!
//! - `fail` propagates the first failure and aborts the run.
//! - `retry` re-attempts with the same resolved inputs, then behaves as `fail`.
//! - `skip` replaces the failure with a null-shaped output record.
//!
//! The policy is resolved per call from the flow's component entry, the
//! component manifest, and the flow-level default, in that order.

mod machine;
mod retry;

pub use machine::{invoke, AttemptRecord, Invocation, InvocationKind, InvocationOutcome};
pub use retry::{
    should_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryState,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do when a component invocation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Abort the run on the first failure.
    #[default]
    #[serde(alias = "stop")]
    Fail,
    /// Re-attempt up to `max_retries` more times.
    Retry,
    /// Produce a null-shaped output and continue.
    Skip,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Retry => write!(f, "retry"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// A declared, possibly partial, error-handling rule.
///
/// Appears at flow level, on a flow's component entry, and in component
/// manifests. Unset fields fall through to the next level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorHandling {
    /// The policy to apply.
    #[serde(default, alias = "default", skip_serializing_if = "Option::is_none")]
    pub on_error: Option<PolicyKind>,
    /// Retries after the first failure under `retry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Base delay between retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}

impl ErrorHandling {
    /// Creates a rule with the given policy.
    #[must_use]
    pub const fn new(kind: PolicyKind) -> Self {
        Self {
            on_error: Some(kind),
            max_retries: None,
            retry_delay_ms: None,
        }
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the base retry delay.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = Some(delay);
        self
    }

    /// Returns true if nothing is declared.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.on_error.is_none() && self.max_retries.is_none() && self.retry_delay_ms.is_none()
    }
}

/// A fully resolved policy for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// The policy kind.
    pub kind: PolicyKind,
    /// Retry timing and limit. Only consulted under `retry`.
    pub retry: RetryConfig,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::fail()
    }
}

impl ErrorPolicy {
    /// The hard-coded default: abort on first failure.
    #[must_use]
    pub fn fail() -> Self {
        Self {
            kind: PolicyKind::Fail,
            retry: RetryConfig::default(),
        }
    }

    /// Retry with the given timing.
    #[must_use]
    pub const fn retry(retry: RetryConfig) -> Self {
        Self {
            kind: PolicyKind::Retry,
            retry,
        }
    }

    /// Skip on failure.
    #[must_use]
    pub fn skip() -> Self {
        Self {
            kind: PolicyKind::Skip,
            retry: RetryConfig::default(),
        }
    }

    /// Resolves a policy from declared rules, most specific first.
    ///
    /// Each field is taken from the first rule that sets it; unset fields
    /// fall back to `defaults`, and an unset kind falls back to `fail`.
    #[must_use]
    pub fn resolve(rules: &[Option<&ErrorHandling>], defaults: &RetryConfig) -> Self {
        let declared = || rules.iter().flatten();

        let kind = declared()
            .find_map(|rule| rule.on_error)
            .unwrap_or_default();
        let max_retries = declared()
            .find_map(|rule| rule.max_retries)
            .unwrap_or(defaults.max_retries);
        let base_delay_ms = declared()
            .find_map(|rule| rule.retry_delay_ms)
            .unwrap_or(defaults.base_delay_ms);

        Self {
            kind,
            retry: defaults
                .clone()
                .with_max_retries(max_retries)
                .with_base_delay_ms(base_delay_ms),
        }
    }
}
