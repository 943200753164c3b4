//! Structured observability hooks for the release lifecycle.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for key lifecycle events: start, stage publish,
//!   gate evaluation, rollback, finish
//!
//! Events are emitted at `info!` level and filtered via `RUST_LOG`.

use tracing::{info, warn};

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run_id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("gantry.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: release run started.
pub fn emit_release_started(run_id: &str, variants: usize, registries: usize) {
    info!(
        event = "release.started",
        run_id = %run_id,
        variants = variants,
        registries = registries,
    );
}

/// Emit event: build stage finished.
pub fn emit_build_finished(run_id: &str, built: usize, success: bool) {
    info!(event = "build.finished", run_id = %run_id, built = built, success = success);
}

/// Emit event: one registry stage's publishes completed.
pub fn emit_stage_published(run_id: &str, registry: &str, succeeded: usize, failed: usize) {
    info!(
        event = "stage.published",
        run_id = %run_id,
        registry = %registry,
        succeeded = succeeded,
        failed = failed,
    );
}

/// Emit event: verification gate evaluated for one stage.
pub fn emit_gate_evaluated(run_id: &str, registry: &str, passed: bool, failing_check: Option<&str>) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        registry = %registry,
        passed = passed,
        failing_check = failing_check.unwrap_or("none"),
    );
}

/// Emit event: rollback issued for a failed stage (warning level).
pub fn emit_rollback(run_id: &str, registry: &str, untagged: usize) {
    warn!(event = "stage.rollback", run_id = %run_id, registry = %registry, untagged = untagged);
}

/// Emit event: release run reached a terminal state.
pub fn emit_release_finished(run_id: &str, status: &str, duration_ms: u64) {
    info!(
        event = "release.finished",
        run_id = %run_id,
        status = %status,
        duration_ms = duration_ms,
    );
}
