//! Sandbox runtime collaborator for live health probes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::artifact::ArtifactRef;

/// Handle to a running sandboxed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxHandle(pub String);

impl std::fmt::Display for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors produced by the sandbox runtime.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to start {artifact}: {cause}")]
    Start { artifact: String, cause: String },

    #[error("probe against {handle} failed: {cause}")]
    Probe { handle: String, cause: String },

    #[error("failed to stop {handle}: {cause}")]
    Stop { handle: String, cause: String },
}

/// The external isolated runtime used for health probes (black box).
///
/// The caller applies the probe timeout; a handle returned by `start` must
/// always be released with `stop`, including when the probe fails.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Pull and run an artifact in isolation.
    async fn start(&self, artifact: &ArtifactRef) -> Result<SandboxHandle, SandboxError>;

    /// Issue one liveness request against a running handle.
    async fn probe(&self, handle: &SandboxHandle, path: &str) -> Result<(), SandboxError>;

    /// Tear the sandbox down.
    async fn stop(&self, handle: SandboxHandle) -> Result<(), SandboxError>;
}
