//! Retry policy with capped exponential backoff.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controls how many times a failed task is retried and how long to wait
/// between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(
        rename = "initial_delay_ms",
        default = "default_initial_delay",
        with = "crate::config::duration_ms"
    )]
    pub initial_delay: Duration,

    /// Growth factor applied per retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound on any single delay.
    #[serde(rename = "max_delay_ms", default = "default_max_delay", with = "crate::config::duration_ms")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl RetryPolicy {
    /// Creates a policy from its four parameters.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        backoff_multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self { max_retries, initial_delay, backoff_multiplier, max_delay }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay to wait before retry number `retry` (1-based).
    ///
    /// `delay(k) = min(initial_delay * multiplier^(k-1), max_delay)`. A value
    /// of 0 is treated as 1.
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(16));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(6), Duration::from_secs(30));
        assert_eq!(policy.delay(60), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_is_monotonic() {
        let policy = RetryPolicy::new(10, Duration::from_millis(150), 1.7, Duration::from_secs(9));
        let mut previous = Duration::ZERO;
        for k in 1..40 {
            let delay = policy.delay(k);
            assert!(delay >= previous, "delay({k}) went down");
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn test_zero_retry_is_first_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), policy.delay(1));
    }

    #[test]
    fn test_policy_from_toml() {
        let policy: RetryPolicy =
            toml::from_str("max_retries = 5\ninitial_delay_ms = 250\nmax_delay_ms = 2000").unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    }
}
