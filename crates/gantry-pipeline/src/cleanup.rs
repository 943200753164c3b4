//! Best-effort rollback of a failed registry stage.

use std::sync::Arc;

use tracing::{info, warn};

use gantry_core::collab::registry::RegistryTransport;
use gantry_core::domain::registry::Registry;
use gantry_core::domain::run::RollbackAction;
use gantry_core::domain::variant::BuiltVariant;

/// Untag everything the failed stage managed to publish.
///
/// `targets` are the variants whose pushes succeeded at this stage: for a
/// mid-publish failure that is the successful partial set; for a
/// verification failure it is every variant. Rollback is best-effort: a
/// failed untag is logged and recorded, never retried, and never changes
/// the run's terminal status.
pub async fn rollback_stage(
    transport: Arc<dyn RegistryTransport>,
    registry: &Registry,
    targets: &[BuiltVariant],
) -> Vec<RollbackAction> {
    let mut actions = Vec::with_capacity(targets.len());

    for item in targets {
        let ok = match transport.untag(&item.artifact, registry).await {
            Ok(()) => {
                info!(
                    variant = %item.variant.name,
                    registry = %registry.name,
                    artifact = %item.artifact.short(),
                    "rolled back"
                );
                true
            }
            Err(err) => {
                warn!(
                    variant = %item.variant.name,
                    registry = %registry.name,
                    error = %err,
                    "rollback untag failed"
                );
                false
            }
        };

        actions.push(RollbackAction {
            variant: item.variant.name.clone(),
            registry: registry.name.clone(),
            ok,
        });
    }

    actions
}
