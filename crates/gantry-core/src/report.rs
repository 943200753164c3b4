//! Release report artifacts.
//!
//! Provides two renderings of a finished [`ReleaseRun`]:
//! - `ReleaseReport` — machine-readable per-stage outcomes + aggregate stats
//!   (release_report.json)
//! - Markdown summary for PR/comment output
//!
//! Reporting is a pure transformation: the run is never mutated.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::attempt::PublishOutcome;
use crate::domain::run::{FailureDetail, ReleaseRun, RunStatus};
use crate::domain::verification::{HealthOutcome, ScanOutcome, VerificationResult};

/// Schema version stamped into every JSON artifact.
pub const REPORT_SCHEMA_VERSION: &str = "1";

/// One variant's publish outcome within a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptReport {
    pub variant: String,
    pub outcome: PublishOutcome,
    /// Transport calls made (retries included).
    pub attempts: u32,
}

/// One registry stage's section of the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageReport {
    pub registry: String,
    pub attempts: Vec<AttemptReport>,
    /// Present when the stage's publishes all completed and the gate ran.
    pub verification: Option<VerificationResult>,
    /// Variants untagged while rolling this stage back.
    pub rolled_back: Vec<String>,
}

/// Canonical release report artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub status: RunStatus,
    pub failure: Option<FailureDetail>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
    pub total_attempts: usize,
    pub total_success: usize,
}

impl ReleaseReport {
    /// Build a report from a finished run. Pure; the run is read-only.
    pub fn from_run(run: &ReleaseRun) -> Self {
        // Stage order is the order registries first appear in the attempt
        // log, which the orchestrator writes strictly in priority order.
        let mut stage_order: Vec<String> = Vec::new();
        for attempt in &run.attempts {
            if !stage_order.contains(&attempt.registry) {
                stage_order.push(attempt.registry.clone());
            }
        }

        let stages = stage_order
            .into_iter()
            .map(|registry| {
                let attempts = run
                    .attempts
                    .iter()
                    .filter(|a| a.registry == registry)
                    .map(|a| AttemptReport {
                        variant: a.variant.clone(),
                        outcome: a.outcome.clone(),
                        attempts: a.attempts,
                    })
                    .collect();

                let verification = run
                    .verifications
                    .iter()
                    .find(|v| v.registry == registry)
                    .cloned();

                let rolled_back = run
                    .rollbacks
                    .iter()
                    .filter(|r| r.registry == registry)
                    .map(|r| r.variant.clone())
                    .collect();

                StageReport {
                    registry,
                    attempts,
                    verification,
                    rolled_back,
                }
            })
            .collect();

        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            run_id: run.run_id,
            status: run.status,
            failure: run.failure.clone(),
            started_at: run.started_at,
            finished_at: run.finished_at,
            stages,
            total_attempts: run.attempts.len(),
            total_success: run.success_count(),
        }
    }

    /// Render the report as a Markdown summary.
    pub fn render_markdown(&self) -> String {
        let mut md = format!("# Release {}\n\n", self.run_id);
        md.push_str(&format!("- status: **{:?}**\n", self.status));
        md.push_str(&format!(
            "- publishes: {}/{} succeeded\n",
            self.total_success, self.total_attempts
        ));
        if let Some(failure) = &self.failure {
            md.push_str(&format!(
                "- failed at: {} ({:?}) — {}\n",
                failure.stage.as_deref().unwrap_or("build"),
                failure.kind,
                failure.detail
            ));
        }

        for stage in &self.stages {
            md.push_str(&format!("\n## {}\n\n", stage.registry));
            for attempt in &stage.attempts {
                let line = match &attempt.outcome {
                    PublishOutcome::Success => format!(
                        "- `{}`: success ({} attempt(s))\n",
                        attempt.variant, attempt.attempts
                    ),
                    PublishOutcome::Failed { reason } => format!(
                        "- `{}`: **failed** after {} attempt(s) — {}\n",
                        attempt.variant, attempt.attempts, reason
                    ),
                    PublishOutcome::Skipped => format!("- `{}`: skipped\n", attempt.variant),
                };
                md.push_str(&line);
            }

            match &stage.verification {
                Some(v) if v.passed() => md.push_str("- verification: passed\n"),
                Some(v) => {
                    md.push_str(&format!(
                        "- verification: **failed** ({})\n",
                        v.failing_check().unwrap_or("unknown")
                    ));
                    if let ScanOutcome::Flagged { findings } = &v.scan {
                        for finding in findings {
                            md.push_str(&format!(
                                "  - [{:?}] {}\n",
                                finding.severity, finding.description
                            ));
                        }
                    }
                    if let HealthOutcome::Unhealthy { detail } = &v.health {
                        md.push_str(&format!("  - health: {detail}\n"));
                    }
                }
                None => md.push_str("- verification: not reached\n"),
            }

            if !stage.rolled_back.is_empty() {
                md.push_str(&format!(
                    "- rolled back: {}\n",
                    stage
                        .rolled_back
                        .iter()
                        .map(|v| format!("`{v}`"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        md
    }
}

/// Write release_report.json in pretty JSON format.
pub fn write_report_json(path: &Path, report: &ReleaseReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize release report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
