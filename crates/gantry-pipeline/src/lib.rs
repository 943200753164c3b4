//! Gantry Pipeline - gated multi-registry release orchestration
//!
//! Provides the release pipeline that:
//! - Builds every variant in the matrix once, concurrently and fail-fast
//! - Publishes to registries in strict priority order, gated on the previous
//!   stage's verification
//! - Verifies every stage (vulnerability scan + live health probe) before
//!   the next may start
//! - Rolls a failed stage back and reports the run

pub mod build;
pub mod cancel;
pub mod cleanup;
pub mod orchestrator;
pub mod publish;
pub mod verify;

// Re-export key types
pub use build::run_build_stage;
pub use cleanup::rollback_stage;
pub use orchestrator::{run_release, Collaborators, Orchestrator};
pub use publish::{publish_stage, StagePublish};
pub use verify::{verify_stage, HEALTH_PROBE_PATH};
