//! Verification gate results: vulnerability scan + live health probe.

use serde::{Deserialize, Serialize};

/// Scanner finding severity, totally ordered.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single vulnerability finding reported by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub description: String,
}

impl Finding {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
        }
    }
}

/// Outcome of the vulnerability scan across every variant in a stage.
///
/// `Clean` only when no finding at or above the configured threshold exists
/// across all variants; otherwise `Flagged` with the findings that crossed
/// the threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scan", rename_all = "snake_case")]
pub enum ScanOutcome {
    Clean,
    Flagged { findings: Vec<Finding> },
}

impl ScanOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ScanOutcome::Clean)
    }
}

/// Outcome of the live health probe across every variant in a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "health", rename_all = "snake_case")]
pub enum HealthOutcome {
    Healthy,
    Unhealthy { detail: String },

    /// The scan failed, so the probe was never attempted. There is no point
    /// probing an artifact already known to be compromised.
    NotProbed,
}

impl HealthOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, HealthOutcome::Healthy)
    }
}

/// The verification result for one registry stage.
///
/// Created after all variant publishes in the stage complete. The stage
/// passes only when both checks pass; the failing check (`scan` vs `health`)
/// is recoverable from the outcome fields for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationResult {
    /// Registry this result belongs to.
    pub registry: String,

    pub scan: ScanOutcome,
    pub health: HealthOutcome,
}

impl VerificationResult {
    /// Conjunction of both checks.
    pub fn passed(&self) -> bool {
        self.scan.passed() && self.health.passed()
    }

    /// Short reason label for reports: `"scan"` or `"health"`.
    pub fn failing_check(&self) -> Option<&'static str> {
        if !self.scan.passed() {
            Some("scan")
        } else if !self.health.passed() {
            Some("health")
        } else {
            None
        }
    }
}
