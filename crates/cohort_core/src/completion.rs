//! crates/cohort_core/src/completion.rs
//!
//! Builds the learner × slot completion matrix for a challenge, the
//! per-slot submission rates, and the all-submitted signal the refund
//! evaluator consumes.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use uuid::Uuid;

use crate::domain::{CompletionPage, LearnerRow, ScheduleSlot, SlotCompletion, SlotRate};
use crate::error::{EngineError, EngineResult};
use crate::ports::{
    AssignmentRepository, ChallengeRepository, EnrollmentRepository, PortError,
    ScheduleSlotRepository, SubmissionRepository,
};

/// Cap on concurrent per-cell submission lookups, so a large
/// learners × slots page cannot flood the data store.
const MAX_CONCURRENT_LOOKUPS: usize = 8;

#[derive(Clone)]
pub struct CompletionService {
    challenges: Arc<dyn ChallengeRepository>,
    slots: Arc<dyn ScheduleSlotRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    submissions: Arc<dyn SubmissionRepository>,
}

impl CompletionService {
    pub fn new(
        challenges: Arc<dyn ChallengeRepository>,
        slots: Arc<dyn ScheduleSlotRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        submissions: Arc<dyn SubmissionRepository>,
    ) -> Self {
        Self {
            challenges,
            slots,
            assignments,
            enrollments,
            submissions,
        }
    }

    /// The challenge's slots that carry an assignment, in sequence
    /// order. Assignment-less slots never appear in completion output.
    pub async fn qualifying_slots(&self, challenge_id: Uuid) -> EngineResult<Vec<ScheduleSlot>> {
        let slots = self.slots.list_for_challenge(challenge_id).await?;
        if slots.is_empty() {
            return Ok(slots);
        }
        let lecture_ids: Vec<Uuid> = slots.iter().map(|s| s.lecture_id).collect();
        let with_assignment: HashSet<Uuid> = self
            .assignments
            .lecture_ids_with_assignment(&lecture_ids)
            .await?
            .into_iter()
            .collect();
        Ok(slots
            .into_iter()
            .filter(|s| with_assignment.contains(&s.lecture_id))
            .collect())
    }

    /// One page of the completion matrix. `page` is 1-based.
    ///
    /// With `completed_only`, learners must appear in the submitted-set
    /// of every qualifying slot; a challenge with no qualifying slots
    /// therefore yields an empty result. The per-cell lookups run
    /// concurrently under [`MAX_CONCURRENT_LOOKUPS`], and each result is
    /// written into its slot-indexed position so the assembled row always
    /// follows sequence order regardless of completion order.
    pub async fn build_matrix(
        &self,
        challenge_id: Uuid,
        page: u64,
        page_size: u64,
        completed_only: bool,
    ) -> EngineResult<CompletionPage> {
        if page < 1 || page_size < 1 {
            return Err(EngineError::Validation(
                "page and page_size must be >= 1".into(),
            ));
        }
        self.challenges
            .find(challenge_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "challenge",
                id: challenge_id,
            })?;

        let qslots = self.qualifying_slots(challenge_id).await?;

        let completed = if completed_only {
            let ids = self.submitted_everywhere(&qslots).await?;
            if ids.is_empty() {
                return Ok(CompletionPage {
                    rows: Vec::new(),
                    total: 0,
                });
            }
            Some(ids)
        } else {
            None
        };

        let offset = (page - 1) * page_size;
        let (total, learners) = match &completed {
            Some(ids) => (
                self.enrollments.count_enrolled_in(challenge_id, ids).await?,
                self.enrollments
                    .list_learners_in(challenge_id, ids, offset, page_size)
                    .await?,
            ),
            None => (
                self.enrollments.count_enrolled(challenge_id).await?,
                self.enrollments
                    .list_learners(challenge_id, offset, page_size)
                    .await?,
            ),
        };

        // One lookup per (learner, slot) cell, fanned out with bounded
        // concurrency and re-assembled by index.
        let submissions = self.submissions.clone();
        let cell_coords: Vec<(usize, usize, Uuid, Uuid)> = learners
            .iter()
            .enumerate()
            .flat_map(|(li, learner)| {
                let user_id = learner.user_id;
                qslots
                    .iter()
                    .enumerate()
                    .map(move |(si, slot)| (li, si, user_id, slot.id))
            })
            .collect();
        let lookups = cell_coords.into_iter().map(|(li, si, user_id, slot_id)| {
            let submissions = submissions.clone();
            async move {
                let artifacts = submissions.list_for(user_id, slot_id).await?;
                Ok::<_, PortError>((li, si, artifacts))
            }
        });

        let mut cells: Vec<Vec<Option<SlotCompletion>>> = learners
            .iter()
            .map(|_| qslots.iter().map(|_| None).collect())
            .collect();
        let mut gather = stream::iter(lookups).buffer_unordered(MAX_CONCURRENT_LOOKUPS);
        while let Some(looked_up) = gather.next().await {
            let (li, si, artifacts) = looked_up?;
            let slot = &qslots[si];
            cells[li][si] = Some(SlotCompletion {
                slot_id: slot.id,
                lecture_id: slot.lecture_id,
                sequence: slot.sequence,
                due_at: slot.due_at,
                is_submitted: !artifacts.is_empty(),
                submission_id: artifacts.first().map(|s| s.id),
                artifacts,
            });
        }
        drop(gather);

        let rows = learners
            .into_iter()
            .zip(cells)
            .map(|(learner, row)| LearnerRow {
                user_id: learner.user_id,
                name: learner.name,
                email: learner.email,
                per_slot: row.into_iter().flatten().collect(),
            })
            .collect();

        Ok(CompletionPage { rows, total })
    }

    /// Submission rate per qualifying slot across the enrolled cohort.
    pub async fn submission_rate_by_slot(
        &self,
        challenge_id: Uuid,
    ) -> EngineResult<Vec<SlotRate>> {
        self.challenges
            .find(challenge_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "challenge",
                id: challenge_id,
            })?;
        let qslots = self.qualifying_slots(challenge_id).await?;
        let total_enrolled = self.enrollments.count_enrolled(challenge_id).await?;

        let mut rates = Vec::with_capacity(qslots.len());
        for slot in qslots {
            let submitted_count = self.submissions.submitted_user_ids(slot.id).await?.len() as u64;
            rates.push(SlotRate {
                slot_id: slot.id,
                sequence: slot.sequence,
                submitted_count,
                total_enrolled,
                rate_percent: percent(submitted_count, total_enrolled),
            });
        }
        Ok(rates)
    }

    /// Single-learner form of the completed-only intersection: true iff
    /// the learner has a submitted state for every qualifying slot.
    /// False when the challenge has no qualifying slots, matching the
    /// empty-intersection rule of the matrix filter.
    pub async fn all_submitted(&self, user_id: Uuid, challenge_id: Uuid) -> EngineResult<bool> {
        let qslots = self.qualifying_slots(challenge_id).await?;
        if qslots.is_empty() {
            return Ok(false);
        }
        for slot in &qslots {
            if self
                .submissions
                .latest_for(user_id, slot.id)
                .await?
                .is_none()
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Intersects the submitted-user sets of every qualifying slot.
    /// Empty slot list yields the empty set. The result is sorted so
    /// downstream pagination is stable.
    async fn submitted_everywhere(&self, qslots: &[ScheduleSlot]) -> EngineResult<Vec<Uuid>> {
        let mut slots = qslots.iter();
        let Some(first) = slots.next() else {
            return Ok(Vec::new());
        };
        let mut acc: HashSet<Uuid> = self
            .submissions
            .submitted_user_ids(first.id)
            .await?
            .into_iter()
            .collect();
        for slot in slots {
            if acc.is_empty() {
                break;
            }
            let here: HashSet<Uuid> = self
                .submissions
                .submitted_user_ids(slot.id)
                .await?
                .into_iter()
                .collect();
            acc.retain(|user| here.contains(user));
        }
        let mut out: Vec<Uuid> = acc.into_iter().collect();
        out.sort();
        Ok(out)
    }
}

/// Nearest-integer percentage, half rounded away from zero; 0 when
/// nobody is enrolled.
fn percent(submitted: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((submitted as f64 / total as f64) * 100.0).round() as u32
}
