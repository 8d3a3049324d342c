//! crates/cohort_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the platform's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or
//! blob storage. Each entity gets its own typed repository so a mismatched
//! lookup is a compile error, not a runtime surprise.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Assignment, Challenge, Enrollment, Learner, Lecture, ScheduleSlot, Submission,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Collaborator unreachable: {0}")]
    Unavailable(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Repository Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    async fn insert(&self, challenge: Challenge) -> PortResult<Challenge>;

    async fn find(&self, challenge_id: Uuid) -> PortResult<Option<Challenge>>;

    async fn update_dates(
        &self,
        challenge_id: Uuid,
        open_date: NaiveDate,
        close_date: NaiveDate,
    ) -> PortResult<()>;
}

#[async_trait]
pub trait LectureRepository: Send + Sync {
    async fn insert(&self, lecture: Lecture) -> PortResult<Lecture>;

    async fn find(&self, lecture_id: Uuid) -> PortResult<Option<Lecture>>;

    /// Removes the lecture; its schedule slots go with it (cascade).
    async fn delete(&self, lecture_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ScheduleSlotRepository: Send + Sync {
    async fn insert(&self, slot: ScheduleSlot) -> PortResult<ScheduleSlot>;

    async fn find(&self, slot_id: Uuid) -> PortResult<Option<ScheduleSlot>>;

    /// All slots of a challenge, ordered by (sequence, id) so duplicate
    /// sequence values still page stably.
    async fn list_for_challenge(&self, challenge_id: Uuid) -> PortResult<Vec<ScheduleSlot>>;

    /// Persists a recomputed open/due window for one slot.
    async fn update_window(
        &self,
        slot_id: Uuid,
        open_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> PortResult<()>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn insert(&self, assignment: Assignment) -> PortResult<Assignment>;

    async fn find_by_lecture(&self, lecture_id: Uuid) -> PortResult<Option<Assignment>>;

    /// Of the given lecture ids, the subset that carries an assignment.
    async fn lecture_ids_with_assignment(&self, lecture_ids: &[Uuid]) -> PortResult<Vec<Uuid>>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Upserts the learner's identity row. Account management lives
    /// elsewhere; this only guarantees the id resolves to a name/email
    /// for matrix output.
    async fn ensure_learner(&self, learner: Learner) -> PortResult<()>;

    async fn insert(&self, enrollment: Enrollment) -> PortResult<Enrollment>;

    async fn find(&self, user_id: Uuid, challenge_id: Uuid) -> PortResult<Option<Enrollment>>;

    /// Flips `refund_requested` to true. Idempotent: updating an
    /// already-true flag is a successful no-op. `NotFound` if the
    /// learner is not enrolled.
    async fn mark_refund_requested(&self, user_id: Uuid, challenge_id: Uuid) -> PortResult<()>;

    async fn count_enrolled(&self, challenge_id: Uuid) -> PortResult<u64>;

    /// Enrolled-learner count restricted to the given user ids.
    async fn count_enrolled_in(&self, challenge_id: Uuid, user_ids: &[Uuid]) -> PortResult<u64>;

    /// A page of enrolled learners ordered by user id.
    async fn list_learners(
        &self,
        challenge_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> PortResult<Vec<Learner>>;

    /// A page of enrolled learners restricted to the given user ids,
    /// ordered by user id.
    async fn list_learners_in(
        &self,
        challenge_id: Uuid,
        user_ids: &[Uuid],
        offset: u64,
        limit: u64,
    ) -> PortResult<Vec<Learner>>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn insert(&self, submission: Submission) -> PortResult<Submission>;

    async fn find(&self, submission_id: Uuid) -> PortResult<Option<Submission>>;

    /// The most recent `is_submit = true` row for the (user, slot) pair.
    async fn latest_for(&self, user_id: Uuid, slot_id: Uuid) -> PortResult<Option<Submission>>;

    /// Every `is_submit = true` row for the (user, slot) pair, most
    /// recent first.
    async fn list_for(&self, user_id: Uuid, slot_id: Uuid) -> PortResult<Vec<Submission>>;

    /// Distinct user ids with at least one `is_submit = true` row for
    /// the slot.
    async fn submitted_user_ids(&self, slot_id: Uuid) -> PortResult<Vec<Uuid>>;

    async fn update_content(
        &self,
        submission_id: Uuid,
        link: &str,
        comment: Option<&str>,
        image_url: Option<&str>,
    ) -> PortResult<()>;

    async fn delete(&self, submission_id: Uuid) -> PortResult<()>;
}

//=========================================================================================
// Collaborator Ports (Traits)
//=========================================================================================

/// The single authoritative time source. Queried over the network so a
/// deadline can never be dodged by adjusting a client clock.
#[async_trait]
pub trait ClockSource: Send + Sync {
    async fn now(&self) -> PortResult<DateTime<Utc>>;
}

/// Blob storage for submission images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads the data under the given namespace and returns the public URL.
    async fn upload(&self, data: Vec<u8>, namespace: &str, filename: &str) -> PortResult<String>;

    async fn remove(&self, url: &str) -> PortResult<()>;
}

/// Validates the caller of a schedule-mutating admin operation.
#[async_trait]
pub trait AuthValidator: Send + Sync {
    async fn validate_admin(&self, token: &str) -> PortResult<()>;
}
