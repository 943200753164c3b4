//! Run configuration knobs.

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::verification::Severity;

/// Configuration for one release run.
///
/// Passed immutably into the orchestrator at construction so runs stay
/// independently testable and parallel-runnable in test suites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Minimum finding severity that flags a scan.
    pub severity_threshold: Severity,

    /// Maximum push/build retries after the first attempt (0 = run once).
    pub retry_limit: u32,

    /// Base delay for exponential backoff between retries (milliseconds).
    pub retry_backoff_ms: u64,

    /// Maximum concurrent variant tasks per stage.
    pub parallelism: usize,

    /// Per-attempt build budget (milliseconds).
    pub build_timeout_ms: u64,

    /// Per-attempt push budget (milliseconds).
    pub push_timeout_ms: u64,

    /// Per-artifact vulnerability scan budget (milliseconds).
    pub scan_timeout_ms: u64,

    /// Liveness probe budget (milliseconds).
    pub health_timeout_ms: u64,

    /// Drain budget granted to in-flight tasks after cancellation
    /// (milliseconds).
    pub cancel_grace_ms: u64,

    /// Whether to issue best-effort untags when a stage fails.
    pub cleanup_on_failure: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::High,
            retry_limit: 3,
            retry_backoff_ms: 500,
            parallelism: 4,
            build_timeout_ms: 1_800_000,
            push_timeout_ms: 300_000,
            scan_timeout_ms: 600_000,
            health_timeout_ms: 30_000,
            cancel_grace_ms: 10_000,
            cleanup_on_failure: true,
        }
    }
}

impl ReleaseConfig {
    /// Reject configurations that would deadlock or never time out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidConfig(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.build_timeout_ms == 0
            || self.push_timeout_ms == 0
            || self.scan_timeout_ms == 0
            || self.health_timeout_ms == 0
        {
            return Err(ConfigError::InvalidConfig(
                "timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = ReleaseConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.severity_threshold, Severity::High);
        assert_eq!(cfg.retry_limit, 3);
        assert!(cfg.cleanup_on_failure);
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let cfg = ReleaseConfig {
            parallelism: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cfg = ReleaseConfig {
            health_timeout_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = ReleaseConfig {
            severity_threshold: Severity::Critical,
            retry_limit: 1,
            retry_backoff_ms: 100,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: ReleaseConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cfg, back);
    }
}
