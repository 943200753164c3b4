//! Retry backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ReleaseConfig;

/// Exponential backoff strategy for transient transport failures.
///
/// A pure function of (attempt count, base delay): attempt `n` (1-based)
/// waits `base * 2^(n-1)` before the next try. Injectable so tests can use
/// the zero-delay variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum retries after the first attempt (0 = run once).
    pub max_retries: u32,

    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// Zero-delay policy for tests.
    pub fn zero(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
        }
    }

    /// Policy carried by a run configuration.
    pub fn from_config(config: &ReleaseConfig) -> Self {
        Self {
            max_retries: config.retry_limit,
            base_delay_ms: config.retry_backoff_ms,
        }
    }

    /// Total attempts allowed (first try + retries).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to sleep after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = BackoffPolicy::new(3, 500);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_zero_policy_never_sleeps() {
        let policy = BackoffPolicy::zero(5);
        assert_eq!(policy.max_attempts(), 6);
        for attempt in 1..=6 {
            assert_eq!(policy.delay_for(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn test_from_config() {
        let config = ReleaseConfig {
            retry_limit: 2,
            retry_backoff_ms: 250,
            ..Default::default()
        };
        let policy = BackoffPolicy::from_config(&config);
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let policy = BackoffPolicy::new(64, u64::MAX / 2);
        // Large attempt numbers must not panic.
        let _ = policy.delay_for(64);
    }
}
