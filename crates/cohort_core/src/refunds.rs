//! crates/cohort_core/src/refunds.rs
//!
//! Refund eligibility: the all-submitted signal joined with the
//! persisted refund-request flag. Evaluation never mutates the flag;
//! the flip is a separate, idempotent action.

use std::sync::Arc;

use uuid::Uuid;

use crate::completion::CompletionService;
use crate::domain::RefundEligibility;
use crate::error::{EngineError, EngineResult};
use crate::ports::{EnrollmentRepository, PortError};

#[derive(Clone)]
pub struct RefundService {
    completion: CompletionService,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl RefundService {
    pub fn new(completion: CompletionService, enrollments: Arc<dyn EnrollmentRepository>) -> Self {
        Self {
            completion,
            enrollments,
        }
    }

    /// The refund signal for one learner in one challenge. `NotFound`
    /// if the learner is not enrolled.
    pub async fn evaluate(
        &self,
        user_id: Uuid,
        challenge_id: Uuid,
    ) -> EngineResult<RefundEligibility> {
        let enrollment = self
            .enrollments
            .find(user_id, challenge_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "enrollment",
                id: user_id,
            })?;
        let all_submitted = self.completion.all_submitted(user_id, challenge_id).await?;
        Ok(RefundEligibility {
            all_submitted,
            refund_requested: enrollment.refund_requested,
        })
    }

    /// Flips the learner's refund-request flag to true. Re-invoking on
    /// an already-true flag is a no-op, not an error.
    pub async fn request_refund(&self, user_id: Uuid, challenge_id: Uuid) -> EngineResult<()> {
        self.enrollments
            .mark_refund_requested(user_id, challenge_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => EngineError::NotFound {
                    kind: "enrollment",
                    id: user_id,
                },
                other => EngineError::Port(other),
            })
    }
}
