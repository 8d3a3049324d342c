//! crates/cohort_core/src/submissions.rs
//!
//! The submission registry: deadline-gated writes for a learner's
//! (user, slot) pair, with image assets handed off to blob storage.
//!
//! The deadline check and the subsequent write are two separate steps;
//! a submission landing in the narrow window after `due_at` passes
//! between them is an accepted race, not eliminated by locking.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::access::AccessGate;
use crate::domain::Submission;
use crate::error::{EngineError, EngineResult};
use crate::ports::{BlobStore, ScheduleSlotRepository, SubmissionRepository};

/// Blob-store namespace for submission images.
const IMAGE_NAMESPACE: &str = "submissions";

/// An image attached to a new or amended submission.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Payload for [`SubmissionService::submit`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub link: String,
    pub comment: Option<String>,
    pub image: Option<ImageUpload>,
}

/// What to do with the stored image on amend.
#[derive(Debug, Clone)]
pub enum ImagePatch {
    Keep,
    Clear,
    Replace(ImageUpload),
}

/// Payload for [`SubmissionService::amend`].
#[derive(Debug, Clone)]
pub struct AmendSubmission {
    pub link: String,
    pub comment: Option<String>,
    pub image: ImagePatch,
}

//=========================================================================================
// SubmissionService
//=========================================================================================

#[derive(Clone)]
pub struct SubmissionService {
    slots: Arc<dyn ScheduleSlotRepository>,
    submissions: Arc<dyn SubmissionRepository>,
    gate: AccessGate,
    storage: Arc<dyn BlobStore>,
}

impl SubmissionService {
    pub fn new(
        slots: Arc<dyn ScheduleSlotRepository>,
        submissions: Arc<dyn SubmissionRepository>,
        gate: AccessGate,
        storage: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            slots,
            submissions,
            gate,
            storage,
        }
    }

    /// Records a learner's submission for a slot.
    ///
    /// The slot must exist and still be within its deadline per the
    /// authoritative clock. The image, if any, is uploaded first; an
    /// upload failure aborts the insert so no record ever carries a
    /// missing asset reference.
    pub async fn submit(
        &self,
        user_id: Uuid,
        slot_id: Uuid,
        payload: NewSubmission,
    ) -> EngineResult<Submission> {
        if payload.link.trim().is_empty() {
            return Err(EngineError::Validation("submission link is required".into()));
        }
        let slot = self
            .slots
            .find(slot_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "slot",
                id: slot_id,
            })?;
        let now = self.gate.ensure_within_deadline(&slot).await?;

        let image_url = match payload.image {
            Some(image) => Some(self.upload_image(image).await?),
            None => None,
        };

        let submission = Submission {
            id: Uuid::new_v4(),
            user_id,
            slot_id,
            submitted_at: now,
            is_submit: true,
            link: payload.link,
            comment: payload.comment,
            image_url,
        };
        Ok(self.submissions.insert(submission).await?)
    }

    /// Edits an existing submission, still gated by the slot deadline.
    ///
    /// Replacing or clearing the image releases the old blob best-effort:
    /// a release failure is logged and the record update proceeds. A
    /// failed upload of a replacement is a hard error and leaves the
    /// record untouched.
    pub async fn amend(
        &self,
        submission_id: Uuid,
        payload: AmendSubmission,
    ) -> EngineResult<Submission> {
        if payload.link.trim().is_empty() {
            return Err(EngineError::Validation("submission link is required".into()));
        }
        let submission =
            self.submissions
                .find(submission_id)
                .await?
                .ok_or(EngineError::NotFound {
                    kind: "submission",
                    id: submission_id,
                })?;
        let slot = self
            .slots
            .find(submission.slot_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "slot",
                id: submission.slot_id,
            })?;
        self.gate.ensure_within_deadline(&slot).await?;

        let image_url = match payload.image {
            ImagePatch::Keep => submission.image_url.clone(),
            ImagePatch::Clear => {
                self.release_image(submission.image_url.as_deref()).await;
                None
            }
            ImagePatch::Replace(image) => {
                self.release_image(submission.image_url.as_deref()).await;
                Some(self.upload_image(image).await?)
            }
        };

        self.submissions
            .update_content(
                submission_id,
                &payload.link,
                payload.comment.as_deref(),
                image_url.as_deref(),
            )
            .await?;

        Ok(Submission {
            link: payload.link,
            comment: payload.comment,
            image_url,
            ..submission
        })
    }

    /// The authoritative submission for a (user, slot) pair, if any.
    pub async fn get_for_user(
        &self,
        user_id: Uuid,
        slot_id: Uuid,
    ) -> EngineResult<Option<Submission>> {
        Ok(self.submissions.latest_for(user_id, slot_id).await?)
    }

    /// Removes a submission, returning the (user, slot) pair to the
    /// unsubmitted state. Not deadline-gated.
    pub async fn delete(&self, submission_id: Uuid) -> EngineResult<()> {
        let submission =
            self.submissions
                .find(submission_id)
                .await?
                .ok_or(EngineError::NotFound {
                    kind: "submission",
                    id: submission_id,
                })?;
        self.release_image(submission.image_url.as_deref()).await;
        self.submissions.delete(submission_id).await?;
        Ok(())
    }

    async fn upload_image(&self, image: ImageUpload) -> EngineResult<String> {
        self.storage
            .upload(image.bytes, IMAGE_NAMESPACE, &image.filename)
            .await
            .map_err(|e| EngineError::StorageFailure(e.to_string()))
    }

    /// Best-effort removal of a stored image. Failures are logged and
    /// swallowed; a stale blob must never block the record update.
    async fn release_image(&self, url: Option<&str>) {
        let Some(url) = url else { return };
        if let Err(e) = self.storage.remove(url).await {
            warn!(url, error = %e, "failed to release submission image");
        }
    }
}
