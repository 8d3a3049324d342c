//! crates/cohort_core/src/error.rs
//!
//! The failure taxonomy for the engine. The core never renders
//! user-facing text; callers translate these variants themselves.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A referenced entity does not exist where its presence is required.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    /// Malformed input, e.g. non-chronological challenge dates or a
    /// submission missing its link.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A write was attempted after the slot's due timestamp.
    #[error("deadline for slot {slot_id} passed at {due_at}")]
    DeadlineExceeded {
        slot_id: Uuid,
        due_at: DateTime<Utc>,
    },

    /// Upload of a required asset failed; the dependent record write was
    /// not issued.
    #[error("asset upload failed: {0}")]
    StorageFailure(String),

    /// The authoritative time source is unreachable. Fatal for any
    /// deadline-gated operation; there is no local-time fallback.
    #[error("authoritative clock unavailable: {0}")]
    ClockUnavailable(String),

    /// A bulk schedule recompute stopped after persisting a strict
    /// subset of slots. `updated` lists the slots already recomputed so
    /// the caller can retry or reconcile.
    #[error("schedule recompute stopped after {} of {} slots (failed on {})", .updated.len(), .total, .failed)]
    PartialScheduleUpdate {
        updated: Vec<Uuid>,
        failed: Uuid,
        total: usize,
        #[source]
        source: PortError,
    },

    /// Any other collaborator failure, passed through unchanged.
    #[error(transparent)]
    Port(#[from] PortError),
}

/// A convenience type alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;
