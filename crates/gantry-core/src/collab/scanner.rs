//! Vulnerability scanner collaborator.

use async_trait::async_trait;

use crate::domain::artifact::ArtifactRef;
use crate::domain::verification::Finding;

/// Errors produced by the scanner itself (as opposed to findings, which are
/// scan results).
#[derive(Debug, thiserror::Error)]
#[error("scanner failed for {artifact}: {cause}")]
pub struct ScanError {
    pub artifact: String,
    pub cause: String,
}

/// The external vulnerability scanner (black box).
#[async_trait]
pub trait VulnerabilityScanner: Send + Sync {
    /// Scan one artifact and return every finding, regardless of severity.
    /// Threshold filtering is the verification gate's job.
    async fn scan(&self, artifact: &ArtifactRef) -> Result<Vec<Finding>, ScanError>;
}
