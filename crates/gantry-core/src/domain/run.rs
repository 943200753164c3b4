//! The release run aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attempt::PublishAttempt;
use super::verification::VerificationResult;

/// Terminal status of a release run.
///
/// Strict gating makes "partial success" unreachable: any stage failure
/// resolves the run as a whole to `Failed`, though earlier stages keep their
/// recorded successes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Which phase produced the terminal failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Build,
    Publish,
    Scan,
    Health,
    Cancelled,
}

/// The stage (if any) that failed, and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureDetail {
    /// Registry name of the failed stage; `None` when the build phase failed
    /// before any registry was touched.
    pub stage: Option<String>,

    pub kind: FailureKind,

    /// Human-readable reason.
    pub detail: String,
}

/// One best-effort rollback action issued during cleanup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollbackAction {
    pub variant: String,
    pub registry: String,

    /// Whether the untag call succeeded. Rollback is best-effort; a failed
    /// untag is recorded, logged, and not retried.
    pub ok: bool,
}

/// Aggregate of everything one `run_release` invocation did.
///
/// Written only by the orchestrator's coordinating task while the run is
/// live; read-only input to the reporter once finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseRun {
    /// Unique id for this invocation.
    pub run_id: Uuid,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Every (variant, registry) publish actually attempted, in stage order.
    pub attempts: Vec<PublishAttempt>,

    /// One entry per registry stage whose publishes all completed.
    pub verifications: Vec<VerificationResult>,

    /// Untags issued while cleaning up a failed stage.
    pub rollbacks: Vec<RollbackAction>,

    /// Terminal failure, when the run did not succeed.
    pub failure: Option<FailureDetail>,

    /// Overall status, computed when the run reaches a terminal state.
    pub status: RunStatus,
}

impl ReleaseRun {
    /// Start a fresh, running aggregate.
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            attempts: Vec::new(),
            verifications: Vec::new(),
            rollbacks: Vec::new(),
            failure: None,
            status: RunStatus::Running,
        }
    }

    /// Merge a completed stage's attempts (the stage's join barrier is the
    /// single mutation point).
    pub fn record_attempts(&mut self, attempts: Vec<PublishAttempt>) {
        self.attempts.extend(attempts);
    }

    pub fn record_verification(&mut self, result: VerificationResult) {
        self.verifications.push(result);
    }

    pub fn record_rollbacks(&mut self, actions: Vec<RollbackAction>) {
        self.rollbacks.extend(actions);
    }

    /// Seal the run with a terminal status.
    pub fn finish(&mut self, status: RunStatus, failure: Option<FailureDetail>) {
        self.status = status;
        self.failure = failure;
        self.finished_at = Some(Utc::now());
    }

    /// Attempts recorded for one registry.
    pub fn attempts_for(&self, registry: &str) -> Vec<&PublishAttempt> {
        self.attempts
            .iter()
            .filter(|a| a.registry == registry)
            .collect()
    }

    /// Number of successful attempts across all stages.
    pub fn success_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }

    /// Wall-clock duration, once finished.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attempt::PublishOutcome;

    fn attempt(variant: &str, registry: &str, outcome: PublishOutcome) -> PublishAttempt {
        let now = Utc::now();
        PublishAttempt {
            variant: variant.to_string(),
            registry: registry.to_string(),
            started_at: now,
            finished_at: now,
            attempts: 1,
            outcome,
        }
    }

    #[test]
    fn test_start_is_running_and_empty() {
        let run = ReleaseRun::start();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.attempts.is_empty());
        assert!(run.finished_at.is_none());
        assert!(run.failure.is_none());
    }

    #[test]
    fn test_finish_seals_status_and_failure() {
        let mut run = ReleaseRun::start();
        run.finish(
            RunStatus::Failed,
            Some(FailureDetail {
                stage: Some("ghcr".to_string()),
                kind: FailureKind::Scan,
                detail: "1 critical finding".to_string(),
            }),
        );
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.failure.as_ref().unwrap().kind, FailureKind::Scan);
        assert!(run.duration_ms().is_some());
    }

    #[test]
    fn test_attempts_for_filters_by_registry() {
        let mut run = ReleaseRun::start();
        run.record_attempts(vec![
            attempt("cpu", "docker-hub", PublishOutcome::Success),
            attempt("cpu", "ghcr", PublishOutcome::Success),
            attempt(
                "gpu-cu128",
                "ghcr",
                PublishOutcome::Failed {
                    reason: "auth".to_string(),
                },
            ),
        ]);

        assert_eq!(run.attempts_for("ghcr").len(), 2);
        assert_eq!(run.attempts_for("docker-hub").len(), 1);
        assert_eq!(run.attempts_for("quay").len(), 0);
        assert_eq!(run.success_count(), 2);
    }

    #[test]
    fn test_release_run_serde_roundtrip() {
        let mut run = ReleaseRun::start();
        run.record_attempts(vec![attempt("latest", "docker-hub", PublishOutcome::Success)]);
        run.finish(RunStatus::Succeeded, None);

        let json = serde_json::to_string(&run).expect("serialize");
        let back: ReleaseRun = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(run, back);
    }
}
