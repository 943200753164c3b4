//! Target registries and the validated publish order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// One distribution registry in the publish chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registry {
    /// Registry name, unique within a list (e.g. "docker-hub", "ghcr").
    pub name: String,

    /// Publish priority. Lower publishes earlier; unique within a list.
    pub priority: u32,

    /// Opaque credentials handle resolved by the transport (e.g. a secret
    /// store key). Never interpreted by the orchestrator.
    pub credentials_ref: String,

    /// Registry endpoint.
    pub endpoint: String,
}

impl Registry {
    /// Create a registry definition.
    pub fn new(
        name: impl Into<String>,
        priority: u32,
        credentials_ref: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            credentials_ref: credentials_ref.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// The immutable, validated publish order for a run.
///
/// Registries are sorted by ascending priority at construction; the gating
/// invariant (stage *p* never starts before stage *p-1* fully verifies) is
/// enforced by the orchestrator walking this order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryList {
    registries: Vec<Registry>,
}

impl RegistryList {
    /// Validate and freeze a publish order.
    ///
    /// Fails if the list is empty, two registries share a name, or two
    /// registries share a priority (the order must be total).
    pub fn new(mut registries: Vec<Registry>) -> Result<Self, ConfigError> {
        if registries.is_empty() {
            return Err(ConfigError::EmptyRegistryList);
        }

        let mut names = HashSet::new();
        for registry in &registries {
            if !names.insert(registry.name.clone()) {
                return Err(ConfigError::DuplicateRegistry {
                    name: registry.name.clone(),
                });
            }
        }

        registries.sort_by_key(|r| r.priority);
        for pair in registries.windows(2) {
            if pair[0].priority == pair[1].priority {
                return Err(ConfigError::DuplicatePriority {
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                    priority: pair[0].priority,
                });
            }
        }

        Ok(Self { registries })
    }

    /// The three-registry chain from the source material:
    /// Docker Hub, then GHCR, then Quay.io.
    pub fn standard() -> Self {
        // Valid by construction.
        Self {
            registries: vec![
                Registry::new("docker-hub", 0, "secrets/docker-hub", "docker.io"),
                Registry::new("ghcr", 1, "secrets/ghcr", "ghcr.io"),
                Registry::new("quay", 2, "secrets/quay", "quay.io"),
            ],
        }
    }

    /// Registries in strict ascending priority order.
    pub fn in_order(&self) -> &[Registry] {
        &self.registries
    }

    /// Number of stages in the chain.
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    /// Whether the chain is empty (never true for a validated list).
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}
