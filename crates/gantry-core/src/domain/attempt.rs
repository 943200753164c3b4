//! Per-(variant, registry) publish attempt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// The artifact was pushed and acknowledged.
    Success,

    /// The push failed; `reason` carries the terminal error (after retries
    /// for transient failures, immediately for permanent ones).
    Failed { reason: String },

    /// The push was never issued (cancellation preempted the task).
    Skipped,
}

/// One (variant, registry) publish record.
///
/// Created when a registry stage begins publishing a variant; immutable once
/// finished. Stages that are never reached record no attempt at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishAttempt {
    /// Variant name.
    pub variant: String,

    /// Registry name.
    pub registry: String,

    /// When the first push attempt was issued.
    pub started_at: DateTime<Utc>,

    /// When the terminal outcome was reached.
    pub finished_at: DateTime<Utc>,

    /// Number of transport calls made (1 = no retries used, 0 = skipped).
    pub attempts: u32,

    /// Terminal outcome.
    pub outcome: PublishOutcome,
}

impl PublishAttempt {
    /// Whether this attempt succeeded.
    pub fn succeeded(&self) -> bool {
        self.outcome == PublishOutcome::Success
    }

    /// Record a push that was preempted before the first transport call.
    pub fn skipped(variant: impl Into<String>, registry: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            variant: variant.into(),
            registry: registry.into(),
            started_at: now,
            finished_at: now,
            attempts: 0,
            outcome: PublishOutcome::Skipped,
        }
    }
}
