//! Domain types for gantry release orchestration.

pub mod artifact;
pub mod attempt;
pub mod error;
pub mod registry;
pub mod run;
pub mod variant;
pub mod verification;

pub use artifact::ArtifactRef;
pub use attempt::{PublishAttempt, PublishOutcome};
pub use error::{ConfigError, Result};
pub use registry::{Registry, RegistryList};
pub use run::{FailureDetail, FailureKind, ReleaseRun, RollbackAction, RunStatus};
pub use variant::{BuiltVariant, Variant, VariantSet};
pub use verification::{Finding, HealthOutcome, ScanOutcome, Severity, VerificationResult};
