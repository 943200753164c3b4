//! The gating state machine that drives a release run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use gantry_core::collab::builder::ArtifactBuilder;
use gantry_core::collab::registry::RegistryTransport;
use gantry_core::collab::sandbox::SandboxRuntime;
use gantry_core::collab::scanner::VulnerabilityScanner;
use gantry_core::config::ReleaseConfig;
use gantry_core::domain::error::ConfigError;
use gantry_core::domain::registry::RegistryList;
use gantry_core::domain::run::{FailureDetail, FailureKind, ReleaseRun, RunStatus};
use gantry_core::domain::variant::{BuiltVariant, VariantSet};
use gantry_core::obs::{
    emit_build_finished, emit_gate_evaluated, emit_release_finished, emit_release_started,
    emit_rollback, emit_stage_published,
};

use crate::build::run_build_stage;
use crate::cancel::with_grace;
use crate::cleanup::rollback_stage;
use crate::publish::publish_stage;
use crate::verify::verify_stage;

/// The external collaborators a run is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub builder: Arc<dyn ArtifactBuilder>,
    pub transport: Arc<dyn RegistryTransport>,
    pub scanner: Arc<dyn VulnerabilityScanner>,
    pub sandbox: Arc<dyn SandboxRuntime>,
}

/// Orchestrator states. `Publishing`/`Verifying` carry the stage index into
/// the registry priority order.
#[derive(Debug)]
enum RunState {
    Init,
    Building,
    Publishing(usize),
    Verifying(usize),
    Cleaning { stage: usize, failure: FailureDetail },
    Terminal(RunStatus),
}

/// Drives one release run through the gating state machine.
///
/// Owns the validated variant matrix, the registry priority order, and the
/// run configuration. The [`ReleaseRun`] aggregate is written only here:
/// stages hand their results back through join barriers and the orchestrator
/// is the single point deciding cleanup vs. termination.
pub struct Orchestrator {
    variant_set: VariantSet,
    registries: RegistryList,
    config: ReleaseConfig,
    collaborators: Collaborators,
}

impl Orchestrator {
    /// Wire an orchestrator. Fails fast on an invalid configuration; variant
    /// and registry validation already happened at their construction.
    pub fn new(
        variant_set: VariantSet,
        registries: RegistryList,
        config: ReleaseConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            variant_set,
            registries,
            config,
            collaborators,
        })
    }

    /// Execute the run to its terminal state.
    ///
    /// Every failure mode past construction is recorded inside the returned
    /// [`ReleaseRun`]; this method itself never fails.
    pub async fn run(&self, cancel: watch::Receiver<bool>) -> ReleaseRun {
        use tracing::Instrument;
        let run = ReleaseRun::start();
        let run_id = run.run_id.to_string();
        let span = tracing::info_span!("gantry.run", run_id = %run_id);

        async move {
        let mut run = run;

        emit_release_started(&run_id, self.variant_set.len(), self.registries.len());

        let grace = Duration::from_millis(self.config.cancel_grace_ms);
        let mut built: Vec<BuiltVariant> = Vec::new();
        let mut state = RunState::Init;

        loop {
            state = match state {
                RunState::Init => RunState::Building,

                RunState::Building => {
                    match run_build_stage(
                        Arc::clone(&self.collaborators.builder),
                        &self.variant_set,
                        &self.config,
                        &cancel,
                    )
                    .await
                    {
                        Ok(artifacts) => {
                            emit_build_finished(&run_id, artifacts.len(), true);
                            built = artifacts;
                            RunState::Publishing(0)
                        }
                        Err(failure) => {
                            // Fatal before any publish; no registry was
                            // touched, so there is nothing to clean.
                            emit_build_finished(&run_id, 0, false);
                            let status = terminal_status(&failure);
                            run.finish(status, Some(failure));
                            RunState::Terminal(status)
                        }
                    }
                }

                RunState::Publishing(i) => {
                    let registry = &self.registries.in_order()[i];
                    let stage = publish_stage(
                        Arc::clone(&self.collaborators.transport),
                        registry,
                        &built,
                        &self.config,
                        &cancel,
                    )
                    .await;

                    emit_stage_published(
                        &run_id,
                        &registry.name,
                        stage.success_count(),
                        stage.attempts.len() - stage.success_count(),
                    );

                    let all_succeeded = stage.all_succeeded();
                    let cancelled = stage.cancelled;
                    let first_failure = stage.first_failure();
                    run.record_attempts(stage.attempts);

                    if all_succeeded && !cancelled {
                        RunState::Verifying(i)
                    } else {
                        let kind = if cancelled {
                            FailureKind::Cancelled
                        } else {
                            FailureKind::Publish
                        };
                        RunState::Cleaning {
                            stage: i,
                            failure: FailureDetail {
                                stage: Some(registry.name.clone()),
                                kind,
                                detail: first_failure
                                    .unwrap_or_else(|| "cancelled after publish".to_string()),
                            },
                        }
                    }
                }

                RunState::Verifying(i) => {
                    let registry = &self.registries.in_order()[i];
                    let gate = verify_stage(
                        Arc::clone(&self.collaborators.scanner),
                        Arc::clone(&self.collaborators.sandbox),
                        registry,
                        &built,
                        &self.config,
                    );

                    match with_grace(gate, &cancel, grace).await {
                        None => RunState::Cleaning {
                            stage: i,
                            failure: FailureDetail {
                                stage: Some(registry.name.clone()),
                                kind: FailureKind::Cancelled,
                                detail: "cancelled during verification".to_string(),
                            },
                        },
                        Some(result) => {
                            let passed = result.passed();
                            emit_gate_evaluated(
                                &run_id,
                                &registry.name,
                                passed,
                                result.failing_check(),
                            );

                            let failure = if passed {
                                None
                            } else {
                                Some(verification_failure(&registry.name, &result))
                            };
                            run.record_verification(result);

                            match failure {
                                None if i + 1 < self.registries.len() => {
                                    RunState::Publishing(i + 1)
                                }
                                None => {
                                    run.finish(RunStatus::Succeeded, None);
                                    RunState::Terminal(RunStatus::Succeeded)
                                }
                                Some(failure) => RunState::Cleaning { stage: i, failure },
                            }
                        }
                    }
                }

                RunState::Cleaning { stage, failure } => {
                    let registry = &self.registries.in_order()[stage];

                    if self.config.cleanup_on_failure {
                        // Untag exactly what this stage managed to publish:
                        // the successful partial set on a publish failure,
                        // every variant on a verification failure.
                        let published: Vec<String> = run
                            .attempts_for(&registry.name)
                            .into_iter()
                            .filter(|a| a.succeeded())
                            .map(|a| a.variant.clone())
                            .collect();
                        let targets: Vec<BuiltVariant> = built
                            .iter()
                            .filter(|b| published.contains(&b.variant.name))
                            .cloned()
                            .collect();

                        let actions = rollback_stage(
                            Arc::clone(&self.collaborators.transport),
                            registry,
                            &targets,
                        )
                        .await;
                        emit_rollback(&run_id, &registry.name, actions.len());
                        run.record_rollbacks(actions);
                    }

                    let status = terminal_status(&failure);
                    run.finish(status, Some(failure));
                    RunState::Terminal(status)
                }

                RunState::Terminal(_) => break,
            };
        }

        emit_release_finished(
            &run_id,
            &format!("{:?}", run.status),
            run.duration_ms().unwrap_or(0),
        );
        info!(
            run_id = %run_id,
            attempts = run.attempts.len(),
            verified_stages = run.verifications.iter().filter(|v| v.passed()).count(),
            "release run finished"
        );

        run
        }
        .instrument(span)
        .await
    }
}

/// The invocation surface: execute one independent release run.
///
/// A `ConfigError` means the run never started; every other failure mode is
/// recorded inside the returned [`ReleaseRun`]. Nothing persists between
/// calls; re-running after a failure replays nothing from prior runs.
pub async fn run_release(
    variant_set: VariantSet,
    registries: RegistryList,
    config: ReleaseConfig,
    collaborators: Collaborators,
    cancel: watch::Receiver<bool>,
) -> Result<ReleaseRun, ConfigError> {
    let orchestrator = Orchestrator::new(variant_set, registries, config, collaborators)?;
    Ok(orchestrator.run(cancel).await)
}

fn terminal_status(failure: &FailureDetail) -> RunStatus {
    if failure.kind == FailureKind::Cancelled {
        RunStatus::Cancelled
    } else {
        RunStatus::Failed
    }
}

fn verification_failure(
    registry: &str,
    result: &gantry_core::domain::verification::VerificationResult,
) -> FailureDetail {
    use gantry_core::domain::verification::{HealthOutcome, ScanOutcome};

    match (&result.scan, &result.health) {
        (ScanOutcome::Flagged { findings }, _) => FailureDetail {
            stage: Some(registry.to_string()),
            kind: FailureKind::Scan,
            detail: format!("{} finding(s) at or above threshold", findings.len()),
        },
        (_, HealthOutcome::Unhealthy { detail }) => FailureDetail {
            stage: Some(registry.to_string()),
            kind: FailureKind::Health,
            detail: detail.clone(),
        },
        _ => FailureDetail {
            stage: Some(registry.to_string()),
            kind: FailureKind::Health,
            detail: "verification failed".to_string(),
        },
    }
}
