//! Registry transport collaborator.

use async_trait::async_trait;

use crate::domain::artifact::ArtifactRef;
use crate::domain::registry::Registry;

/// Errors produced by the registry transport.
///
/// The transient/permanent split drives the retry policy: transient failures
/// (network, timeout) are retried with backoff up to the configured limit;
/// permanent failures (auth, quota) fail the stage immediately.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("transient push failure: {0}")]
    Transient(String),

    #[error("permanent push failure: {0}")]
    Permanent(String),
}

impl PushError {
    /// Whether this failure is eligible for retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, PushError::Transient(_))
    }
}

/// The external registry transport (black box).
///
/// Credentials are resolved by the transport from
/// [`Registry::credentials_ref`]; the orchestrator never sees secrets.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Push an artifact to a registry.
    async fn push(&self, artifact: &ArtifactRef, registry: &Registry) -> Result<(), PushError>;

    /// Remove or untag an artifact during rollback. Best-effort; callers
    /// log and continue on error.
    async fn untag(&self, artifact: &ArtifactRef, registry: &Registry) -> Result<(), PushError>;
}
