//! Gantry Core Library
//!
//! Domain model, collaborator seams, and report artifacts for gated
//! multi-registry release orchestration. The pipeline itself lives in the
//! `gantry-pipeline` crate; everything here is runtime-agnostic data and
//! contracts.

pub mod collab;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod obs;
pub mod report;
pub mod retry;
pub mod telemetry;

pub use collab::{
    ArtifactBuilder, BuildError, PushError, RegistryTransport, SandboxError, SandboxHandle,
    SandboxRuntime, ScanError, VulnerabilityScanner,
};
pub use config::ReleaseConfig;
pub use domain::{
    ArtifactRef, BuiltVariant, ConfigError, FailureDetail, FailureKind, Finding, HealthOutcome,
    PublishAttempt, PublishOutcome, Registry, RegistryList, ReleaseRun, RollbackAction, RunStatus,
    ScanOutcome, Severity, Variant, VariantSet, VerificationResult,
};
pub use report::{write_report_json, AttemptReport, ReleaseReport, StageReport};
pub use retry::BackoffPolicy;
pub use telemetry::init_tracing;

/// Gantry version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
