//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryBuilder`, `MemoryRegistry`, `ScriptedScanner`, and
//! `MemorySandbox` that satisfy the trait contracts without any external
//! dependencies. Failures, delays, and findings are scripted per artifact so
//! integration tests can drive every gating path deterministically.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::collab::builder::{ArtifactBuilder, BuildError};
use crate::collab::registry::{PushError, RegistryTransport};
use crate::collab::sandbox::{SandboxError, SandboxHandle, SandboxRuntime};
use crate::collab::scanner::{ScanError, VulnerabilityScanner};
use crate::domain::artifact::ArtifactRef;
use crate::domain::registry::Registry;
use crate::domain::variant::Variant;
use crate::domain::verification::Finding;

// ---------------------------------------------------------------------------
// MemoryBuilder
// ---------------------------------------------------------------------------

/// In-memory builder with cache-hit semantics.
///
/// The artifact reference is the SHA-256 of the variant's canonical build
/// parameters, so equal parameters always yield an equal reference. A cache
/// hit performs no "build side effect": the side-effect counter only
/// increments on a miss, which is what the idempotence tests observe.
#[derive(Debug, Default)]
pub struct MemoryBuilder {
    cache: Mutex<HashMap<Vec<u8>, ArtifactRef>>,
    side_effects: Mutex<HashMap<String, u32>>,
    artifacts: Mutex<HashMap<String, ArtifactRef>>,
    failures: Mutex<HashMap<String, String>>,
    delays_ms: Mutex<HashMap<String, u64>>,
}

impl MemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a failure for one variant.
    pub fn fail_variant(&self, variant: &str, cause: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(variant.to_string(), cause.to_string());
    }

    /// Clear a previously scripted failure (the "builder now fixed" case).
    pub fn repair_variant(&self, variant: &str) {
        self.failures.lock().unwrap().remove(variant);
    }

    /// Delay one variant's build, for cancellation and timeout tests.
    pub fn delay_variant(&self, variant: &str, delay_ms: u64) {
        self.delays_ms
            .lock()
            .unwrap()
            .insert(variant.to_string(), delay_ms);
    }

    /// Number of real (cache-missing) build side effects for a variant.
    pub fn build_count(&self, variant: &str) -> u32 {
        self.side_effects
            .lock()
            .unwrap()
            .get(variant)
            .copied()
            .unwrap_or(0)
    }

    /// The artifact most recently built for a variant name, if any.
    pub fn artifact_for(&self, variant: &str) -> Option<ArtifactRef> {
        self.artifacts.lock().unwrap().get(variant).cloned()
    }
}

#[async_trait]
impl ArtifactBuilder for MemoryBuilder {
    async fn build(&self, variant: &Variant) -> Result<ArtifactRef, BuildError> {
        let delay = self
            .delays_ms
            .lock()
            .unwrap()
            .get(&variant.name)
            .copied()
            .unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(cause) = self.failures.lock().unwrap().get(&variant.name) {
            return Err(BuildError::Failed {
                variant: variant.name.clone(),
                cause: cause.clone(),
            });
        }

        let key = variant.parameter_digest_input();
        let mut cache = self.cache.lock().unwrap();
        let artifact = match cache.get(&key).cloned() {
            Some(hit) => hit,
            None => {
                let built = ArtifactRef::from_bytes(&key);
                cache.insert(key, built.clone());
                *self
                    .side_effects
                    .lock()
                    .unwrap()
                    .entry(variant.name.clone())
                    .or_insert(0) += 1;
                built
            }
        };
        drop(cache);
        self.artifacts
            .lock()
            .unwrap()
            .insert(variant.name.clone(), artifact.clone());
        Ok(artifact)
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistry
// ---------------------------------------------------------------------------

type ArtifactAt = (String, String); // (artifact hex, registry name)

/// In-memory registry transport with scripted failures.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    transient_remaining: Mutex<HashMap<ArtifactAt, u32>>,
    permanent: Mutex<HashMap<ArtifactAt, String>>,
    push_calls: Mutex<HashMap<ArtifactAt, u32>>,
    pushed: Mutex<Vec<ArtifactAt>>,
    untagged: Mutex<Vec<ArtifactAt>>,
    push_delay_ms: Mutex<u64>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `count` transient failures before pushes start succeeding.
    pub fn script_transient(&self, artifact: &ArtifactRef, registry: &str, count: u32) {
        self.transient_remaining
            .lock()
            .unwrap()
            .insert((artifact.as_str().to_string(), registry.to_string()), count);
    }

    /// Script a permanent failure for every push of this pair.
    pub fn script_permanent(&self, artifact: &ArtifactRef, registry: &str, cause: &str) {
        self.permanent.lock().unwrap().insert(
            (artifact.as_str().to_string(), registry.to_string()),
            cause.to_string(),
        );
    }

    /// Delay every push, for cancellation tests.
    pub fn set_push_delay(&self, delay_ms: u64) {
        *self.push_delay_ms.lock().unwrap() = delay_ms;
    }

    /// Number of transport calls for a pair (retries included).
    pub fn push_count(&self, artifact: &ArtifactRef, registry: &str) -> u32 {
        self.push_calls
            .lock()
            .unwrap()
            .get(&(artifact.as_str().to_string(), registry.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the pair is currently published (pushed and not untagged).
    pub fn is_published(&self, artifact: &ArtifactRef, registry: &str) -> bool {
        let key = (artifact.as_str().to_string(), registry.to_string());
        self.pushed.lock().unwrap().contains(&key)
            && !self.untagged.lock().unwrap().contains(&key)
    }

    /// Every untag issued, as (artifact hex, registry name).
    pub fn untags(&self) -> Vec<ArtifactAt> {
        self.untagged.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryTransport for MemoryRegistry {
    async fn push(&self, artifact: &ArtifactRef, registry: &Registry) -> Result<(), PushError> {
        let delay = *self.push_delay_ms.lock().unwrap();
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let key = (artifact.as_str().to_string(), registry.name.clone());
        *self.push_calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        if let Some(cause) = self.permanent.lock().unwrap().get(&key) {
            return Err(PushError::Permanent(cause.clone()));
        }

        {
            let mut transient = self.transient_remaining.lock().unwrap();
            if let Some(remaining) = transient.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(PushError::Transient("connection reset".to_string()));
                }
            }
        }

        self.pushed.lock().unwrap().push(key);
        Ok(())
    }

    async fn untag(&self, artifact: &ArtifactRef, registry: &Registry) -> Result<(), PushError> {
        self.untagged
            .lock()
            .unwrap()
            .push((artifact.as_str().to_string(), registry.name.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedScanner
// ---------------------------------------------------------------------------

/// Scanner fake returning configured findings per artifact.
///
/// Artifacts without a script scan clean.
#[derive(Debug, Default)]
pub struct ScriptedScanner {
    findings: Mutex<HashMap<String, Vec<Finding>>>,
    errors: Mutex<HashMap<String, String>>,
    scanned: Mutex<Vec<String>>,
}

impl ScriptedScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the findings one artifact reports.
    pub fn script_findings(&self, artifact: &ArtifactRef, findings: Vec<Finding>) {
        self.findings
            .lock()
            .unwrap()
            .insert(artifact.as_str().to_string(), findings);
    }

    /// Script a scanner infrastructure error for one artifact.
    pub fn script_error(&self, artifact: &ArtifactRef, cause: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(artifact.as_str().to_string(), cause.to_string());
    }

    /// Number of scans issued so far.
    pub fn scan_count(&self) -> usize {
        self.scanned.lock().unwrap().len()
    }
}

#[async_trait]
impl VulnerabilityScanner for ScriptedScanner {
    async fn scan(&self, artifact: &ArtifactRef) -> Result<Vec<Finding>, ScanError> {
        self.scanned
            .lock()
            .unwrap()
            .push(artifact.as_str().to_string());

        if let Some(cause) = self.errors.lock().unwrap().get(artifact.as_str()) {
            return Err(ScanError {
                artifact: artifact.short().to_string(),
                cause: cause.clone(),
            });
        }

        Ok(self
            .findings
            .lock()
            .unwrap()
            .get(artifact.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MemorySandbox
// ---------------------------------------------------------------------------

/// Scripted probe behavior for one artifact.
#[derive(Debug, Clone)]
pub enum ProbeScript {
    /// Respond immediately with success.
    Ok,
    /// Respond immediately with a failure.
    Fail(String),
    /// Never respond; the caller's timeout fires.
    Hang,
}

/// In-memory sandbox runtime with scripted probe outcomes.
#[derive(Debug, Default)]
pub struct MemorySandbox {
    probes: Mutex<HashMap<String, ProbeScript>>,
    start_errors: Mutex<HashMap<String, String>>,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    next_handle: Mutex<u64>,
}

impl MemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the probe behavior for one artifact (default: `Ok`).
    pub fn script_probe(&self, artifact: &ArtifactRef, script: ProbeScript) {
        self.probes
            .lock()
            .unwrap()
            .insert(artifact.as_str().to_string(), script);
    }

    /// Script a launch failure for one artifact.
    pub fn script_start_error(&self, artifact: &ArtifactRef, cause: &str) {
        self.start_errors
            .lock()
            .unwrap()
            .insert(artifact.as_str().to_string(), cause.to_string());
    }

    /// Number of sandboxes started.
    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    /// Number of sandboxes stopped. Must equal `start_count` after a run:
    /// the gate releases every handle it acquires.
    pub fn stop_count(&self) -> usize {
        self.stopped.lock().unwrap().len()
    }
}

#[async_trait]
impl SandboxRuntime for MemorySandbox {
    async fn start(&self, artifact: &ArtifactRef) -> Result<SandboxHandle, SandboxError> {
        if let Some(cause) = self.start_errors.lock().unwrap().get(artifact.as_str()) {
            return Err(SandboxError::Start {
                artifact: artifact.short().to_string(),
                cause: cause.clone(),
            });
        }

        let mut next = self.next_handle.lock().unwrap();
        *next += 1;
        let handle = SandboxHandle(format!("sbx-{}-{}", artifact.short(), *next));
        drop(next);

        self.started
            .lock()
            .unwrap()
            .push(artifact.as_str().to_string());
        Ok(handle)
    }

    async fn probe(&self, handle: &SandboxHandle, _path: &str) -> Result<(), SandboxError> {
        // Handle names embed the artifact short ref; match scripts on it.
        let script = {
            let probes = self.probes.lock().unwrap();
            probes
                .iter()
                .find(|(artifact, _)| handle.0.contains(&artifact[..12]))
                .map(|(_, script)| script.clone())
                .unwrap_or(ProbeScript::Ok)
        };

        match script {
            ProbeScript::Ok => Ok(()),
            ProbeScript::Fail(cause) => Err(SandboxError::Probe {
                handle: handle.0.clone(),
                cause,
            }),
            ProbeScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    async fn stop(&self, handle: SandboxHandle) -> Result<(), SandboxError> {
        self.stopped.lock().unwrap().push(handle.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::variant::VariantSet;
    use crate::domain::verification::Severity;

    #[tokio::test]
    async fn test_builder_cache_hit_is_idempotent() {
        let builder = MemoryBuilder::new();
        let variant = VariantSet::standard().variants()[0].clone();

        let first = builder.build(&variant).await.expect("first build");
        let second = builder.build(&variant).await.expect("second build");

        assert_eq!(first, second);
        assert_eq!(builder.build_count(&variant.name), 1);
    }

    #[tokio::test]
    async fn test_builder_scripted_failure_and_repair() {
        let builder = MemoryBuilder::new();
        let variant = VariantSet::standard().variants()[2].clone();

        builder.fail_variant(&variant.name, "base image pull failed");
        assert!(builder.build(&variant).await.is_err());

        builder.repair_variant(&variant.name);
        assert!(builder.build(&variant).await.is_ok());
    }

    #[tokio::test]
    async fn test_registry_transient_then_success() {
        let transport = MemoryRegistry::new();
        let registry = Registry::new("ghcr", 1, "secrets/ghcr", "ghcr.io");
        let artifact = ArtifactRef::from_bytes(b"image");

        transport.script_transient(&artifact, "ghcr", 2);

        assert!(transport.push(&artifact, &registry).await.is_err());
        assert!(transport.push(&artifact, &registry).await.is_err());
        assert!(transport.push(&artifact, &registry).await.is_ok());
        assert_eq!(transport.push_count(&artifact, "ghcr"), 3);
        assert!(transport.is_published(&artifact, "ghcr"));
    }

    #[tokio::test]
    async fn test_registry_untag_unpublishes() {
        let transport = MemoryRegistry::new();
        let registry = Registry::new("quay", 2, "secrets/quay", "quay.io");
        let artifact = ArtifactRef::from_bytes(b"image");

        transport.push(&artifact, &registry).await.expect("push");
        transport.untag(&artifact, &registry).await.expect("untag");

        assert!(!transport.is_published(&artifact, "quay"));
        assert_eq!(transport.untags().len(), 1);
    }

    #[tokio::test]
    async fn test_scanner_default_is_clean() {
        let scanner = ScriptedScanner::new();
        let artifact = ArtifactRef::from_bytes(b"image");
        let findings = scanner.scan(&artifact).await.expect("scan");
        assert!(findings.is_empty());
        assert_eq!(scanner.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_scanner_scripted_findings() {
        let scanner = ScriptedScanner::new();
        let artifact = ArtifactRef::from_bytes(b"image");
        scanner.script_findings(
            &artifact,
            vec![Finding::new(Severity::Critical, "CVE-2025-0001")],
        );

        let findings = scanner.scan(&artifact).await.expect("scan");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_sandbox_start_probe_stop() {
        let sandbox = MemorySandbox::new();
        let artifact = ArtifactRef::from_bytes(b"image");

        let handle = sandbox.start(&artifact).await.expect("start");
        sandbox.probe(&handle, "/health").await.expect("probe");
        sandbox.stop(handle).await.expect("stop");

        assert_eq!(sandbox.start_count(), 1);
        assert_eq!(sandbox.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_sandbox_scripted_probe_failure() {
        let sandbox = MemorySandbox::new();
        let artifact = ArtifactRef::from_bytes(b"image");
        sandbox.script_probe(&artifact, ProbeScript::Fail("503".to_string()));

        let handle = sandbox.start(&artifact).await.expect("start");
        let err = sandbox.probe(&handle, "/health").await.unwrap_err();
        assert!(matches!(err, SandboxError::Probe { .. }));
    }
}
