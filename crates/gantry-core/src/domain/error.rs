//! Domain-level error taxonomy for gantry.

/// Errors produced by variant, registry, or run-config validation.
///
/// A `ConfigError` is fatal before the run starts: `run_release` returns it
/// as `Err` and never touches the builder or any registry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("variant set must not be empty")]
    EmptyVariantSet,

    #[error("duplicate variant name: {name}")]
    DuplicateVariant { name: String },

    #[error("variant '{variant}' declares contradictory parameters: {first} vs {second}")]
    ContradictoryParameters {
        variant: String,
        first: String,
        second: String,
    },

    #[error("registry list must not be empty")]
    EmptyRegistryList,

    #[error("duplicate registry name: {name}")]
    DuplicateRegistry { name: String },

    #[error("registries '{first}' and '{second}' share priority {priority}")]
    DuplicatePriority {
        first: String,
        second: String,
        priority: u32,
    },

    #[error("invalid artifact ref: {value}")]
    InvalidArtifactRef { value: String },

    #[error("invalid release config: {0}")]
    InvalidConfig(String),
}

/// Result type for gantry domain operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::DuplicateVariant {
            name: "gpu-cu128".to_string(),
        };
        assert!(err.to_string().contains("duplicate variant"));

        let err = ConfigError::DuplicatePriority {
            first: "docker-hub".to_string(),
            second: "ghcr".to_string(),
            priority: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("docker-hub"));
        assert!(msg.contains("ghcr"));
        assert!(msg.contains('0'));
    }

    #[test]
    fn test_contradictory_parameters_display() {
        let err = ConfigError::ContradictoryParameters {
            variant: "cpu".to_string(),
            first: "cpu-only".to_string(),
            second: "cuda-12.8".to_string(),
        };
        assert!(err.to_string().contains("contradictory"));
        assert!(err.to_string().contains("cpu-only"));
    }
}
