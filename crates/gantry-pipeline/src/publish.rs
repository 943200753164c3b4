//! Registry stage: concurrent variant publishes with retry and a join
//! barrier.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use gantry_core::collab::registry::{PushError, RegistryTransport};
use gantry_core::config::ReleaseConfig;
use gantry_core::domain::attempt::{PublishAttempt, PublishOutcome};
use gantry_core::domain::registry::Registry;
use gantry_core::domain::variant::BuiltVariant;
use gantry_core::retry::BackoffPolicy;

use crate::cancel::{is_cancelled, with_grace};

/// The joined result of one registry stage's publishes.
///
/// The orchestrator only ever sees this aggregate, never per-task
/// completion. The stage succeeds only when *all* variants pushed; a
/// partially-published registry is worse than none, so one failure halts the
/// pipeline even though sibling successes stay recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePublish {
    /// One attempt per variant, in matrix order.
    pub attempts: Vec<PublishAttempt>,

    /// Whether cancellation was observed while the stage ran.
    pub cancelled: bool,
}

impl StagePublish {
    /// Whether every variant pushed successfully.
    pub fn all_succeeded(&self) -> bool {
        self.attempts.iter().all(|a| a.succeeded())
    }

    /// First failure reason, for the stage's failure detail.
    pub fn first_failure(&self) -> Option<String> {
        self.attempts.iter().find_map(|a| match &a.outcome {
            PublishOutcome::Failed { reason } => {
                Some(format!("variant '{}': {}", a.variant, reason))
            }
            PublishOutcome::Skipped => Some(format!("variant '{}': skipped", a.variant)),
            PublishOutcome::Success => None,
        })
    }

    pub fn success_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }
}

/// Publish every built variant to one registry.
///
/// Variants push concurrently (bounded by `config.parallelism`) with no
/// ordering guarantee among themselves. Transient transport failures and
/// push timeouts retry with exponential backoff up to `config.retry_limit`;
/// permanent failures fail the variant immediately. Attempts are merged at
/// the join barrier, a single mutation point rather than a lock per write.
pub async fn publish_stage(
    transport: Arc<dyn RegistryTransport>,
    registry: &Registry,
    built: &[BuiltVariant],
    config: &ReleaseConfig,
    cancel: &watch::Receiver<bool>,
) -> StagePublish {
    let policy = BackoffPolicy::from_config(config);
    let sem = Arc::new(Semaphore::new(config.parallelism));

    let mut tasks = Vec::new();
    for item in built {
        let transport = Arc::clone(&transport);
        let sem = Arc::clone(&sem);
        let cancel = cancel.clone();
        let registry = registry.clone();
        let item = item.clone();
        let config = config.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            push_one(transport, &registry, &item, &config, policy, &cancel).await
        }));
    }

    // Join barrier: no transition decision is made until every variant task
    // has completed.
    let joined = futures::future::join_all(tasks).await;

    let mut attempts = Vec::with_capacity(built.len());
    for (task, item) in joined.into_iter().zip(built) {
        match task {
            Ok(attempt) => attempts.push(attempt),
            Err(join_err) => {
                warn!(variant = %item.variant.name, error = %join_err, "publish task aborted");
                let now = Utc::now();
                attempts.push(PublishAttempt {
                    variant: item.variant.name.clone(),
                    registry: registry.name.clone(),
                    started_at: now,
                    finished_at: now,
                    attempts: 0,
                    outcome: PublishOutcome::Failed {
                        reason: format!("publish task aborted: {join_err}"),
                    },
                });
            }
        }
    }

    StagePublish {
        attempts,
        cancelled: is_cancelled(cancel),
    }
}

async fn push_one(
    transport: Arc<dyn RegistryTransport>,
    registry: &Registry,
    item: &BuiltVariant,
    config: &ReleaseConfig,
    policy: BackoffPolicy,
    cancel: &watch::Receiver<bool>,
) -> PublishAttempt {
    let variant = item.variant.name.clone();

    // Cancellation before the first transport call: never issued.
    if is_cancelled(cancel) {
        return PublishAttempt::skipped(variant, registry.name.clone());
    }

    let budget = Duration::from_millis(config.push_timeout_ms);
    let grace = Duration::from_millis(config.cancel_grace_ms);
    let started_at = Utc::now();
    let mut attempt = 0u32;

    let outcome = loop {
        attempt += 1;

        let call = tokio::time::timeout(budget, transport.push(&item.artifact, registry));
        match with_grace(call, cancel, grace).await {
            // Grace expired with the push in flight; its result is unknown,
            // so the attempt is recorded as failed and rollback will handle
            // anything that actually landed.
            None => {
                break PublishOutcome::Failed {
                    reason: "cancelled while push was in flight".to_string(),
                }
            }

            Some(Ok(Ok(()))) => {
                debug!(variant = %variant, registry = %registry.name, "variant pushed");
                break PublishOutcome::Success;
            }

            Some(Ok(Err(err @ PushError::Permanent(_)))) => {
                break PublishOutcome::Failed {
                    reason: err.to_string(),
                }
            }

            Some(Ok(Err(PushError::Transient(reason)))) => {
                if attempt >= policy.max_attempts() {
                    // Escalate: retries exhausted turns transient into
                    // permanent for this stage.
                    break PublishOutcome::Failed {
                        reason: format!(
                            "transient push failure persisted across {attempt} attempt(s): {reason}"
                        ),
                    };
                }
                if is_cancelled(cancel) {
                    break PublishOutcome::Failed {
                        reason: "cancelled before retry".to_string(),
                    };
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }

            // A push timeout counts as transient.
            Some(Err(_elapsed)) => {
                if attempt >= policy.max_attempts() {
                    break PublishOutcome::Failed {
                        reason: format!(
                            "push timed out after {attempt} attempt(s) ({}ms budget)",
                            config.push_timeout_ms
                        ),
                    };
                }
                if is_cancelled(cancel) {
                    break PublishOutcome::Failed {
                        reason: "cancelled before retry".to_string(),
                    };
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    };

    PublishAttempt {
        variant,
        registry: registry.name.clone(),
        started_at,
        finished_at: Utc::now(),
        attempts: attempt,
        outcome,
    }
}
