//! External builder collaborator.

use async_trait::async_trait;

use crate::domain::artifact::ArtifactRef;
use crate::domain::variant::Variant;

/// Errors produced by the external builder.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("builder failed for variant '{variant}': {cause}")]
    Failed { variant: String, cause: String },

    #[error("build for variant '{variant}' timed out after {elapsed_ms}ms")]
    Timeout { variant: String, elapsed_ms: u64 },
}

/// The external artifact builder (black box).
///
/// Guarantees the orchestrator relies on:
/// - Equal build parameters yield a functionally equivalent artifact with an
///   equal [`ArtifactRef`].
/// - Re-invoking `build` for parameters with a non-expired cached artifact is
///   a no-op (cache-hit semantics); the cache is the builder's own state and
///   survives across runs.
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    /// Build one variant and return its content-addressed reference.
    async fn build(&self, variant: &Variant) -> Result<ArtifactRef, BuildError>;
}
