//! Retry timing for the `retry` error policy.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Doubles on every retry.
    #[default]
    Exponential,
    /// Grows by the base delay on every retry.
    Linear,
    /// Always the base delay.
    Constant,
}

impl BackoffStrategy {
    /// Delay before retry number `retry` (zero-based), uncapped.
    #[must_use]
    pub fn delay_ms(self, base_ms: u64, retry: u32) -> u64 {
        match self {
            Self::Exponential => base_ms.saturating_mul(2u64.saturating_pow(retry)),
            Self::Linear => base_ms.saturating_mul(u64::from(retry).saturating_add(1)),
            Self::Constant => base_ms,
        }
    }
}

/// Randomization applied to a backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Use the backoff delay as is.
    None,
    /// Anywhere between zero and the delay.
    #[default]
    Full,
    /// Half the delay plus a random half.
    Equal,
    /// Between the base and three times the previous delay.
    Decorrelated,
}

/// Timing of retries under the `retry` policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Growth of the delay.
    pub backoff_strategy: BackoffStrategy,
    /// Randomization of the delay.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_strategy: BackoffStrategy::default(),
            jitter_strategy: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

/// Retries scheduled so far for one invocation.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Retries already scheduled.
    pub retries: u32,
    last_delay_ms: Option<u64>,
}

impl RetryState {
    /// Creates a state with no retries scheduled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the delay for the next retry without scheduling it.
    pub fn next_delay(&mut self, config: &RetryConfig) -> Duration {
        let cap = config.max_delay_ms;
        let delay = config
            .backoff_strategy
            .delay_ms(config.base_delay_ms, self.retries)
            .min(cap);
        let mut rng = rand::thread_rng();

        let millis = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full if delay == 0 => 0,
            JitterStrategy::Full => rng.gen_range(0..=delay),
            JitterStrategy::Equal => delay / 2 + rng.gen_range(0..=delay - delay / 2),
            JitterStrategy::Decorrelated => {
                let floor = config.base_delay_ms.min(cap);
                let ceiling = self
                    .last_delay_ms
                    .unwrap_or(floor)
                    .saturating_mul(3)
                    .min(cap);
                let next = if ceiling > floor {
                    rng.gen_range(floor..=ceiling)
                } else {
                    floor
                };
                self.last_delay_ms = Some(next);
                next
            }
        };
        Duration::from_millis(millis)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then try again.
    Retry(Duration),
    /// The retry budget is spent.
    Exhausted,
    /// The error is marked permanent.
    Permanent,
}

/// Decides whether a failed attempt gets another try, scheduling it if so.
#[must_use]
pub fn should_retry(state: &mut RetryState, config: &RetryConfig, permanent: bool) -> RetryDecision {
    if permanent {
        RetryDecision::Permanent
    } else if state.retries >= config.max_retries {
        RetryDecision::Exhausted
    } else {
        let delay = state.next_delay(config);
        state.retries += 1;
        RetryDecision::Retry(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(backoff: BackoffStrategy) -> RetryConfig {
        RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(backoff)
            .with_jitter(JitterStrategy::None)
    }

    fn delays(config: &RetryConfig, n: usize) -> Vec<u64> {
        let mut state = RetryState::new();
        (0..n)
            .map(|_| match should_retry(&mut state, config, false) {
                RetryDecision::Retry(delay) => u64::try_from(delay.as_millis()).unwrap(),
                other => panic!("unexpected decision: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_backoff_sequences() {
        assert_eq!(delays(&fixed(BackoffStrategy::Exponential), 3), vec![100, 200, 400]);
        assert_eq!(delays(&fixed(BackoffStrategy::Linear), 3), vec![100, 200, 300]);
        assert_eq!(delays(&fixed(BackoffStrategy::Constant), 3), vec![100, 100, 100]);
    }

    #[test]
    fn test_cap_applies() {
        let config = fixed(BackoffStrategy::Exponential)
            .with_max_retries(6)
            .with_max_delay_ms(350);
        assert_eq!(delays(&config, 4), vec![100, 200, 350, 350]);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        for jitter in [JitterStrategy::Full, JitterStrategy::Equal] {
            let config = fixed(BackoffStrategy::Constant).with_jitter(jitter);
            let mut state = RetryState::new();
            for _ in 0..20 {
                let delay = state.next_delay(&config);
                assert!(delay <= Duration::from_millis(100));
                if jitter == JitterStrategy::Equal {
                    assert!(delay >= Duration::from_millis(50));
                }
            }
        }

        let config = fixed(BackoffStrategy::Constant)
            .with_jitter(JitterStrategy::Decorrelated)
            .with_max_delay_ms(250);
        let mut state = RetryState::new();
        for _ in 0..20 {
            let delay = state.next_delay(&config);
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(250));
        }
    }

    #[test]
    fn test_budget_and_permanent_errors() {
        let config = fixed(BackoffStrategy::Constant).with_max_retries(1);
        let mut state = RetryState::new();

        assert_eq!(should_retry(&mut state, &config, true), RetryDecision::Permanent);
        assert_eq!(state.retries, 0);
        assert!(matches!(should_retry(&mut state, &config, false), RetryDecision::Retry(_)));
        assert_eq!(should_retry(&mut state, &config, false), RetryDecision::Exhausted);
    }

    #[test]
    fn test_strategies_use_snake_case() {
        let config: RetryConfig = serde_json::from_value(serde_json::json!({
            "max_retries": 1,
            "base_delay_ms": 5,
            "max_delay_ms": 50,
            "backoff_strategy": "linear",
            "jitter_strategy": "decorrelated"
        }))
        .unwrap();
        assert_eq!(config.backoff_strategy, BackoffStrategy::Linear);
        assert_eq!(config.jitter_strategy, JitterStrategy::Decorrelated);
        assert_eq!(RetryConfig::default().max_retries, 3);
    }
}
