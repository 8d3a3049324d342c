//! crates/cohort_core/src/domain.rs
//!
//! Defines the pure, core data structures for the platform.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// A time-boxed cohort enrollment period containing an ordered
/// sequence of lectures.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: Uuid,
    pub name: String,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub lecture_count: i32,
}

/// A lecture owned independently of any challenge; it may be attached
/// to zero or more challenges through schedule slots.
#[derive(Debug, Clone)]
pub struct Lecture {
    pub id: Uuid,
    pub name: String,
    pub video_url: Option<String>,
    pub body: Option<String>,
}

/// The per-challenge, per-lecture scheduling record carrying the
/// computed open/due timestamps.
///
/// `sequence` is the 1-based position within the challenge. Duplicate
/// sequence values across different lectures are permitted; each slot
/// unlocks independently.
#[derive(Debug, Clone)]
pub struct ScheduleSlot {
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub lecture_id: Uuid,
    pub sequence: i32,
    pub open_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// A learner's membership in a challenge. `refund_requested` flips once,
/// false to true, and is never reverted.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub user_id: Uuid,
    pub challenge_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    pub refund_requested: bool,
}

/// The assignment attached to a lecture (at most one per lecture).
/// Slots whose lecture has no assignment are excluded from completion
/// tracking entirely.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub title: String,
    pub body: String,
}

/// A learner's submission for one schedule slot. The logical key is
/// (`user_id`, `slot_id`) but multiple rows per key are allowed; the
/// most recent `is_submit = true` row is authoritative for completion.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub is_submit: bool,
    pub link: String,
    pub comment: Option<String>,
    pub image_url: Option<String>,
}

// Read-model row for matrix output - identity only, no credentials.
#[derive(Debug, Clone)]
pub struct Learner {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

/// One cell of the completion matrix: a learner's state for one
/// qualifying slot, with every submitted row surfaced as an artifact.
#[derive(Debug, Clone)]
pub struct SlotCompletion {
    pub slot_id: Uuid,
    pub lecture_id: Uuid,
    pub sequence: i32,
    pub due_at: DateTime<Utc>,
    pub is_submitted: bool,
    pub submission_id: Option<Uuid>,
    pub artifacts: Vec<Submission>,
}

/// One row of the completion matrix.
#[derive(Debug, Clone)]
pub struct LearnerRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub per_slot: Vec<SlotCompletion>,
}

/// A page of the completion matrix. `total` counts all matching
/// learners, not just the ones on this page.
#[derive(Debug, Clone)]
pub struct CompletionPage {
    pub rows: Vec<LearnerRow>,
    pub total: u64,
}

/// Per-slot submission rate across the enrolled cohort.
#[derive(Debug, Clone)]
pub struct SlotRate {
    pub slot_id: Uuid,
    pub sequence: i32,
    pub submitted_count: u64,
    pub total_enrolled: u64,
    pub rate_percent: u32,
}

/// Refund signal for one learner in one challenge.
#[derive(Debug, Clone)]
pub struct RefundEligibility {
    pub all_submitted: bool,
    pub refund_requested: bool,
}
