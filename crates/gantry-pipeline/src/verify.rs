//! Verification gate: vulnerability scan, then live health probe.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use gantry_core::collab::sandbox::SandboxRuntime;
use gantry_core::collab::scanner::VulnerabilityScanner;
use gantry_core::config::ReleaseConfig;
use gantry_core::domain::registry::Registry;
use gantry_core::domain::variant::BuiltVariant;
use gantry_core::domain::verification::{
    Finding, HealthOutcome, ScanOutcome, Severity, VerificationResult,
};

/// Liveness endpoint probed inside the sandbox.
pub const HEALTH_PROBE_PATH: &str = "/health";

/// Run the verification gate for one registry stage.
///
/// The two checks run in sequence: the scan must pass before the health
/// probe is attempted; there is no point probing an artifact already known
/// to be compromised. Neither check is retried; a failed verification is a
/// signal, not a glitch. Scanner and sandbox infrastructure errors fold into
/// `Flagged`/`Unhealthy` so the gate always yields a recordable result.
pub async fn verify_stage(
    scanner: Arc<dyn VulnerabilityScanner>,
    sandbox: Arc<dyn SandboxRuntime>,
    registry: &Registry,
    built: &[BuiltVariant],
    config: &ReleaseConfig,
) -> VerificationResult {
    let scan = scan_all(scanner, built, config).await;
    if !scan.passed() {
        return VerificationResult {
            registry: registry.name.clone(),
            scan,
            health: HealthOutcome::NotProbed,
        };
    }

    let health = probe_all(sandbox, built, config).await;
    VerificationResult {
        registry: registry.name.clone(),
        scan,
        health,
    }
}

/// Scan every variant; `Clean` only when no finding at or above the
/// configured threshold exists across all of them.
async fn scan_all(
    scanner: Arc<dyn VulnerabilityScanner>,
    built: &[BuiltVariant],
    config: &ReleaseConfig,
) -> ScanOutcome {
    let budget = Duration::from_millis(config.scan_timeout_ms);
    let mut flagged: Vec<Finding> = Vec::new();

    for item in built {
        let variant = &item.variant.name;
        match tokio::time::timeout(budget, scanner.scan(&item.artifact)).await {
            Ok(Ok(findings)) => {
                let over: Vec<Finding> = findings
                    .into_iter()
                    .filter(|f| f.severity >= config.severity_threshold)
                    .map(|f| Finding::new(f.severity, format!("{variant}: {}", f.description)))
                    .collect();
                debug!(variant = %variant, flagged = over.len(), "variant scanned");
                flagged.extend(over);
            }

            // Infrastructure failures are Flagged-equivalent hard failures.
            Ok(Err(err)) => {
                flagged.push(Finding::new(
                    Severity::Critical,
                    format!("{variant}: scanner error: {err}"),
                ));
                break;
            }
            Err(_elapsed) => {
                flagged.push(Finding::new(
                    Severity::Critical,
                    format!(
                        "{variant}: scan timed out after {}ms",
                        config.scan_timeout_ms
                    ),
                ));
                break;
            }
        }
    }

    if flagged.is_empty() {
        ScanOutcome::Clean
    } else {
        ScanOutcome::Flagged { findings: flagged }
    }
}

/// Probe every variant in the sandbox; `Healthy` requires a successful
/// response within the timeout for all of them. Handles are always released,
/// including on probe failure.
async fn probe_all(
    sandbox: Arc<dyn SandboxRuntime>,
    built: &[BuiltVariant],
    config: &ReleaseConfig,
) -> HealthOutcome {
    let budget = Duration::from_millis(config.health_timeout_ms);

    for item in built {
        let variant = &item.variant.name;

        let handle = match sandbox.start(&item.artifact).await {
            Ok(handle) => handle,
            Err(err) => {
                return HealthOutcome::Unhealthy {
                    detail: format!("{variant}: failed to start sandbox: {err}"),
                };
            }
        };

        let probe = tokio::time::timeout(budget, sandbox.probe(&handle, HEALTH_PROBE_PATH)).await;

        if let Err(err) = sandbox.stop(handle).await {
            warn!(variant = %variant, error = %err, "sandbox stop failed");
        }

        match probe {
            Ok(Ok(())) => {
                debug!(variant = %variant, "variant healthy");
            }
            Ok(Err(err)) => {
                return HealthOutcome::Unhealthy {
                    detail: format!("{variant}: {err}"),
                };
            }
            Err(_elapsed) => {
                return HealthOutcome::Unhealthy {
                    detail: format!(
                        "{variant}: probe timed out after {}ms",
                        config.health_timeout_ms
                    ),
                };
            }
        }
    }

    HealthOutcome::Healthy
}
