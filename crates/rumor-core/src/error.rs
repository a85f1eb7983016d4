//! Error types for rumor engine operations
//!
//! Only invariant violations, stale updates, validation failures, and
//! unknown ids are errors. A rumor that does not merge, cannot reach its
//! target, or is unknown to the would-be teller is an ordinary outcome.

use thiserror::Error;

/// Errors surfaced to the caller or transport layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RumorError {
    /// Referenced rumor, variant, or spread record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The operation would break a data-model invariant (lineage, uniqueness)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A spread update older than the stored record
    #[error(
        "Stale update for rumor {rumor_id}, listener {agent_id}: \
         stored tick {stored_tick}, attempted tick {attempted_tick}"
    )]
    StaleUpdate {
        rumor_id: String,
        agent_id: String,
        stored_tick: u64,
        attempted_tick: u64,
    },

    /// Malformed input rejected at the store boundary
    #[error("Validation error: {0}")]
    Validation(String),
}

impl RumorError {
    pub fn rumor_not_found(id: impl Into<String>) -> Self {
        RumorError::NotFound {
            kind: "rumor",
            id: id.into(),
        }
    }

    pub fn variant_not_found(id: impl Into<String>) -> Self {
        RumorError::NotFound {
            kind: "variant",
            id: id.into(),
        }
    }

    pub fn spread_not_found(rumor_id: &str, agent_id: &str) -> Self {
        RumorError::NotFound {
            kind: "spread",
            id: format!("{}/{}", rumor_id, agent_id),
        }
    }
}

/// Result alias for engine operations
pub type RumorResult<T> = Result<T, RumorError>;
