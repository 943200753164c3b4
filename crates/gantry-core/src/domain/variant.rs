//! Build matrix variants.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::artifact::ArtifactRef;
use super::error::ConfigError;

/// Reserved parameter key for the accelerator axis.
///
/// A variant may declare `cpu-only` or a CUDA compute target on this axis,
/// never both (the two are mutually exclusive feature flags).
pub const ACCELERATOR_KEY: &str = "accelerator";

/// Marker value for CPU-only builds on the accelerator axis.
pub const ACCELERATOR_CPU_ONLY: &str = "cpu-only";

/// Reserved parameter key that conflicts with a `cpu-only` accelerator.
pub const CUDA_CAPABILITY_KEY: &str = "cuda-capability";

/// One build configuration in the matrix (e.g. GPU vs CPU flavor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variant {
    /// Variant name, unique within a set (e.g. "latest", "gpu-cu128", "cpu").
    pub name: String,

    /// Builder parameters for this flavor. `BTreeMap` so the parameter
    /// digest is stable across runs.
    pub build_parameters: BTreeMap<String, String>,
}

impl Variant {
    /// Create a variant with the given name and parameters.
    pub fn new(name: impl Into<String>, build_parameters: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            build_parameters,
        }
    }

    /// Canonical byte encoding of the build parameters.
    ///
    /// Equal parameters always produce equal bytes, which is what makes the
    /// builder's cache-hit semantics observable: the same parameters hash to
    /// the same [`ArtifactRef`].
    pub fn parameter_digest_input(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (key, value) in &self.build_parameters {
            buf.extend_from_slice(key.as_bytes());
            buf.push(b'=');
            buf.extend_from_slice(value.as_bytes());
            buf.push(b'\n');
        }
        buf
    }

    /// Whether this variant declares mutually exclusive accelerator flags.
    fn contradiction(&self) -> Option<(String, String)> {
        let cpu_only = self
            .build_parameters
            .get(ACCELERATOR_KEY)
            .is_some_and(|v| v == ACCELERATOR_CPU_ONLY);
        if cpu_only {
            if let Some(capability) = self.build_parameters.get(CUDA_CAPABILITY_KEY) {
                return Some((
                    ACCELERATOR_CPU_ONLY.to_string(),
                    format!("{CUDA_CAPABILITY_KEY}={capability}"),
                ));
            }
        }
        None
    }
}

/// A variant paired with the artifact the build stage produced for it.
///
/// Created once per variant when the build stage completes; immutable
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuiltVariant {
    pub variant: Variant,
    pub artifact: ArtifactRef,
}

/// The fixed, validated build matrix for a run.
///
/// Construction is the single validation point: a set that passes
/// [`VariantSet::new`] can be handed to the orchestrator without further
/// checks. `variants()` is pure and side-effect free.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantSet {
    variants: Vec<Variant>,
}

impl VariantSet {
    /// Validate and freeze a build matrix.
    ///
    /// Fails if the set is empty, any two variants share a name, or a
    /// variant declares contradictory accelerator parameters.
    pub fn new(variants: Vec<Variant>) -> Result<Self, ConfigError> {
        if variants.is_empty() {
            return Err(ConfigError::EmptyVariantSet);
        }

        let mut seen = HashSet::new();
        for variant in &variants {
            if !seen.insert(variant.name.clone()) {
                return Err(ConfigError::DuplicateVariant {
                    name: variant.name.clone(),
                });
            }
            if let Some((first, second)) = variant.contradiction() {
                return Err(ConfigError::ContradictoryParameters {
                    variant: variant.name.clone(),
                    first,
                    second,
                });
            }
        }

        Ok(Self { variants })
    }

    /// The canonical docling-style matrix: `latest`, `gpu-cu128`, `cpu`.
    pub fn standard() -> Self {
        let latest = Variant::new(
            "latest",
            BTreeMap::from([(ACCELERATOR_KEY.to_string(), "auto".to_string())]),
        );
        let gpu = Variant::new(
            "gpu-cu128",
            BTreeMap::from([
                (ACCELERATOR_KEY.to_string(), "gpu".to_string()),
                (CUDA_CAPABILITY_KEY.to_string(), "12.8".to_string()),
            ]),
        );
        let cpu = Variant::new(
            "cpu",
            BTreeMap::from([(ACCELERATOR_KEY.to_string(), ACCELERATOR_CPU_ONLY.to_string())]),
        );

        // The standard matrix is valid by construction.
        Self {
            variants: vec![latest, gpu, cpu],
        }
    }

    /// The fixed ordered sequence of variant definitions for a run.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Number of variants in the matrix.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the matrix is empty (never true for a validated set).
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
