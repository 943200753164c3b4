//! Build stage: one builder call per variant, concurrent and fail-fast.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use gantry_core::collab::builder::ArtifactBuilder;
use gantry_core::config::ReleaseConfig;
use gantry_core::domain::run::{FailureDetail, FailureKind};
use gantry_core::domain::variant::{BuiltVariant, Variant, VariantSet};
use gantry_core::retry::BackoffPolicy;

use crate::cancel::{is_cancelled, with_grace};

/// Build every variant in the matrix.
///
/// Variant builds run as independent concurrent tasks bounded by
/// `config.parallelism`; there is no ordering requirement between them. Any
/// builder failure is fatal for the whole run: no registry stage may
/// proceed with a partially built matrix. A build timeout is transient and
/// retried with backoff; a builder error is not.
///
/// On success, the returned list is in variant-set order.
pub async fn run_build_stage(
    builder: Arc<dyn ArtifactBuilder>,
    variant_set: &VariantSet,
    config: &ReleaseConfig,
    cancel: &watch::Receiver<bool>,
) -> Result<Vec<BuiltVariant>, FailureDetail> {
    let policy = BackoffPolicy::from_config(config);
    let sem = Arc::new(Semaphore::new(config.parallelism));

    let mut tasks = Vec::new();
    for variant in variant_set.variants() {
        let builder = Arc::clone(&builder);
        let sem = Arc::clone(&sem);
        let cancel = cancel.clone();
        let variant = variant.clone();
        let config = config.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            build_one(builder, &variant, &config, policy, &cancel).await
        }));
    }

    let mut built = Vec::with_capacity(variant_set.len());
    let mut first_failure: Option<FailureDetail> = None;
    for task in tasks {
        match task.await {
            Ok(Ok(item)) => built.push(item),
            Ok(Err(failure)) => {
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
            Err(join_err) => {
                warn!(error = %join_err, "build task aborted");
                if first_failure.is_none() {
                    first_failure = Some(FailureDetail {
                        stage: None,
                        kind: FailureKind::Build,
                        detail: format!("build task aborted: {join_err}"),
                    });
                }
            }
        }
    }

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(built),
    }
}

async fn build_one(
    builder: Arc<dyn ArtifactBuilder>,
    variant: &Variant,
    config: &ReleaseConfig,
    policy: BackoffPolicy,
    cancel: &watch::Receiver<bool>,
) -> Result<BuiltVariant, FailureDetail> {
    let budget = Duration::from_millis(config.build_timeout_ms);
    let grace = Duration::from_millis(config.cancel_grace_ms);

    for attempt in 1..=policy.max_attempts() {
        // No first attempt and no retries once cancellation is requested.
        if is_cancelled(cancel) {
            return Err(cancelled_failure(&variant.name));
        }

        let call = tokio::time::timeout(budget, builder.build(variant));
        match with_grace(call, cancel, grace).await {
            // Grace expired while the build was in flight.
            None => return Err(cancelled_failure(&variant.name)),

            Some(Ok(Ok(artifact))) => {
                debug!(variant = %variant.name, artifact = %artifact.short(), "variant built");
                return Ok(BuiltVariant {
                    variant: variant.clone(),
                    artifact,
                });
            }

            // Builder errors are fatal, never retried.
            Some(Ok(Err(err))) => {
                return Err(FailureDetail {
                    stage: None,
                    kind: FailureKind::Build,
                    detail: err.to_string(),
                });
            }

            // Timeout is transient: back off and retry.
            Some(Err(_elapsed)) => {
                if attempt == policy.max_attempts() {
                    return Err(FailureDetail {
                        stage: None,
                        kind: FailureKind::Build,
                        detail: format!(
                            "build for variant '{}' timed out after {} attempt(s) ({}ms budget)",
                            variant.name,
                            attempt,
                            config.build_timeout_ms
                        ),
                    });
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }

    // Loop always returns within max_attempts; satisfy the compiler.
    Err(FailureDetail {
        stage: None,
        kind: FailureKind::Build,
        detail: format!("build for variant '{}' exhausted all attempts", variant.name),
    })
}

fn cancelled_failure(variant: &str) -> FailureDetail {
    FailureDetail {
        stage: None,
        kind: FailureKind::Cancelled,
        detail: format!("cancelled while building variant '{variant}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::fakes::MemoryBuilder;

    fn fast_config() -> ReleaseConfig {
        ReleaseConfig {
            retry_limit: 2,
            retry_backoff_ms: 0,
            build_timeout_ms: 200,
            cancel_grace_ms: 50,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_builds_every_variant_in_order() {
        let builder = Arc::new(MemoryBuilder::new());
        let set = VariantSet::standard();

        let built = run_build_stage(builder.clone(), &set, &fast_config(), &crate::cancel::never())
            .await
            .expect("build stage");

        assert_eq!(built.len(), 3);
        let names: Vec<&str> = built.iter().map(|b| b.variant.name.as_str()).collect();
        assert_eq!(names, vec!["latest", "gpu-cu128", "cpu"]);
        for item in &built {
            assert_eq!(builder.artifact_for(&item.variant.name), Some(item.artifact.clone()));
        }
    }

    #[tokio::test]
    async fn test_builder_error_is_fatal() {
        let builder = Arc::new(MemoryBuilder::new());
        builder.fail_variant("cpu", "base image pull failed");
        let set = VariantSet::standard();

        let failure = run_build_stage(builder, &set, &fast_config(), &crate::cancel::never())
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Build);
        assert!(failure.stage.is_none());
        assert!(failure.detail.contains("cpu"));
    }

    #[tokio::test]
    async fn test_build_timeout_retries_then_fails() {
        let builder = Arc::new(MemoryBuilder::new());
        // Stall one variant beyond the budget so every attempt times out.
        builder.delay_variant("latest", 10_000);
        let set = VariantSet::standard();

        let failure = run_build_stage(builder, &set, &fast_config(), &crate::cancel::never())
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Build);
        assert!(failure.detail.contains("timed out"));
        assert!(failure.detail.contains("3 attempt(s)"));
    }

    #[tokio::test]
    async fn test_repeated_runs_hit_builder_cache() {
        let builder = Arc::new(MemoryBuilder::new());
        let set = VariantSet::standard();
        let config = fast_config();

        let first = run_build_stage(builder.clone(), &set, &config, &crate::cancel::never())
            .await
            .expect("first run");
        let second = run_build_stage(builder.clone(), &set, &config, &crate::cancel::never())
            .await
            .expect("second run");

        assert_eq!(first, second);
        for variant in set.variants() {
            assert_eq!(builder.build_count(&variant.name), 1);
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let builder = Arc::new(MemoryBuilder::new());
        let set = VariantSet::standard();
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).expect("cancel");

        let failure = run_build_stage(builder, &set, &fast_config(), &rx)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Cancelled);
    }
}
