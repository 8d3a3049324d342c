//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use cohort_core::domain::{
    Challenge, Enrollment, LearnerRow, Lecture, ScheduleSlot, SlotCompletion, SlotRate, Submission,
};
use cohort_core::submissions::{AmendSubmission, ImagePatch, ImageUpload, NewSubmission};
use cohort_core::{is_open, EngineError};

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_challenge_handler,
        reschedule_challenge_handler,
        create_lecture_handler,
        attach_lecture_handler,
        completion_matrix_handler,
        submission_rates_handler,
        enroll_handler,
        list_slots_handler,
        view_lecture_handler,
        submit_handler,
        my_submission_handler,
        amend_handler,
        delete_submission_handler,
        refund_eligibility_handler,
        request_refund_handler,
    ),
    components(
        schemas(
            CreateChallengeRequest,
            RescheduleRequest,
            CreateLectureRequest,
            AttachLectureRequest,
            EnrollRequest,
            ChallengeResponse,
            LectureResponse,
            SlotResponse,
            SlotStateResponse,
            LectureViewResponse,
            EnrollmentResponse,
            SubmissionResponse,
            SlotCompletionResponse,
            LearnerRowResponse,
            MatrixResponse,
            SlotRateResponse,
            RefundEligibilityResponse,
        )
    ),
    tags(
        (name = "Cohort Platform API", description = "Lecture scheduling, submissions, and completion tracking.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateChallengeRequest {
    pub name: String,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLectureRequest {
    pub name: String,
    pub video_url: Option<String>,
    pub body: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AttachLectureRequest {
    pub lecture_id: Uuid,
    pub sequence: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub name: String,
    pub email: String,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MatrixQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Only learners who submitted every qualifying slot.
    #[serde(default)]
    pub completed_only: bool,
}

//=========================================================================================
// API Response Payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ChallengeResponse {
    pub id: Uuid,
    pub name: String,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub lecture_count: i32,
}

impl From<Challenge> for ChallengeResponse {
    fn from(c: Challenge) -> Self {
        Self {
            id: c.id,
            name: c.name,
            open_date: c.open_date,
            close_date: c.close_date,
            lecture_count: c.lecture_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LectureResponse {
    pub id: Uuid,
    pub name: String,
    pub video_url: Option<String>,
    pub body: Option<String>,
}

impl From<Lecture> for LectureResponse {
    fn from(l: Lecture) -> Self {
        Self {
            id: l.id,
            name: l.name,
            video_url: l.video_url,
            body: l.body,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SlotResponse {
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub lecture_id: Uuid,
    pub sequence: i32,
    pub open_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl From<ScheduleSlot> for SlotResponse {
    fn from(s: ScheduleSlot) -> Self {
        Self {
            id: s.id,
            challenge_id: s.challenge_id,
            lecture_id: s.lecture_id,
            sequence: s.sequence,
            open_at: s.open_at,
            due_at: s.due_at,
        }
    }
}

/// A slot together with its current unlock state.
#[derive(Serialize, ToSchema)]
pub struct SlotStateResponse {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub sequence: i32,
    pub open_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub is_open: bool,
}

#[derive(Serialize, ToSchema)]
pub struct LectureViewResponse {
    pub slot: SlotResponse,
    pub lecture: LectureResponse,
}

#[derive(Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub user_id: Uuid,
    pub challenge_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    pub refund_requested: bool,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            user_id: e.user_id,
            challenge_id: e.challenge_id,
            enrolled_at: e.enrolled_at,
            refund_requested: e.refund_requested,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub link: String,
    pub comment: Option<String>,
    pub image_url: Option<String>,
}

impl From<Submission> for SubmissionResponse {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            slot_id: s.slot_id,
            submitted_at: s.submitted_at,
            link: s.link,
            comment: s.comment,
            image_url: s.image_url,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SlotCompletionResponse {
    pub slot_id: Uuid,
    pub lecture_id: Uuid,
    pub sequence: i32,
    pub due_at: DateTime<Utc>,
    pub is_submitted: bool,
    pub submission_id: Option<Uuid>,
    pub artifacts: Vec<SubmissionResponse>,
}

impl From<SlotCompletion> for SlotCompletionResponse {
    fn from(c: SlotCompletion) -> Self {
        Self {
            slot_id: c.slot_id,
            lecture_id: c.lecture_id,
            sequence: c.sequence,
            due_at: c.due_at,
            is_submitted: c.is_submitted,
            submission_id: c.submission_id,
            artifacts: c.artifacts.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LearnerRowResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub per_slot: Vec<SlotCompletionResponse>,
}

impl From<LearnerRow> for LearnerRowResponse {
    fn from(r: LearnerRow) -> Self {
        Self {
            user_id: r.user_id,
            name: r.name,
            email: r.email,
            per_slot: r.per_slot.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MatrixResponse {
    pub rows: Vec<LearnerRowResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Serialize, ToSchema)]
pub struct SlotRateResponse {
    pub slot_id: Uuid,
    pub sequence: i32,
    pub submitted_count: u64,
    pub total_enrolled: u64,
    pub rate_percent: u32,
}

impl From<SlotRate> for SlotRateResponse {
    fn from(r: SlotRate) -> Self {
        Self {
            slot_id: r.slot_id,
            sequence: r.sequence,
            submitted_count: r.submitted_count,
            total_enrolled: r.total_enrolled,
            rate_percent: r.rate_percent,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RefundEligibilityResponse {
    pub all_submitted: bool,
    pub refund_requested: bool,
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Translates an engine failure into an HTTP status and message. The
/// engine itself never produces user-facing text; this is the one place
/// the API layer renders its variants.
fn engine_response(e: EngineError) -> (StatusCode, String) {
    let status = match &e {
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::DeadlineExceeded { .. } => StatusCode::CONFLICT,
        EngineError::StorageFailure(_) => StatusCode::BAD_GATEWAY,
        EngineError::ClockUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::PartialScheduleUpdate { .. } | EngineError::Port(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() || status == StatusCode::SERVICE_UNAVAILABLE {
        error!("Engine failure: {:?}", e);
    }
    (status, e.to_string())
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

/// The fields of a multipart submission form.
#[derive(Default)]
struct SubmissionForm {
    link: Option<String>,
    comment: Option<String>,
    image: Option<ImageUpload>,
    remove_image: bool,
}

async fn read_submission_form(
    mut multipart: Multipart,
) -> Result<SubmissionForm, (StatusCode, String)> {
    let mut form = SubmissionForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "link" => {
                form.link = Some(field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid link field: {}", e))
                })?);
            }
            "comment" => {
                form.comment = Some(field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid comment field: {}", e))
                })?);
            }
            "remove_image" => {
                let value = field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid remove_image field: {}", e))
                })?;
                form.remove_image = value == "true";
            }
            "image" => {
                let filename = field.file_name().unwrap_or("image.bin").to_string();
                let data = field.bytes().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read image bytes: {}", e))
                })?;
                form.image = Some(ImageUpload {
                    bytes: data.to_vec(),
                    filename,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

//=========================================================================================
// Admin Handlers
//=========================================================================================

/// Create a new challenge.
#[utoipa::path(
    post,
    path = "/challenges",
    request_body = CreateChallengeRequest,
    responses(
        (status = 201, description = "Challenge created", body = ChallengeResponse),
        (status = 400, description = "Invalid name or non-chronological dates"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn create_challenge_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let challenge = state
        .schedule
        .create_challenge(&req.name, req.open_date, req.close_date)
        .await
        .map_err(engine_response)?;
    Ok((StatusCode::CREATED, Json(ChallengeResponse::from(challenge))))
}

/// Re-date a challenge and bulk-recompute every slot window.
///
/// A partial failure is surfaced as a 500 naming how far the recompute
/// got, so the edit can be retried.
#[utoipa::path(
    put,
    path = "/challenges/{challenge_id}/schedule",
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "All slot windows recomputed", body = [SlotResponse]),
        (status = 400, description = "Non-chronological dates"),
        (status = 404, description = "Challenge not found"),
        (status = 500, description = "Recompute stopped partway")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge to re-date.")
    )
)]
pub async fn reschedule_challenge_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let slots = state
        .schedule
        .reschedule(challenge_id, req.open_date, req.close_date)
        .await
        .map_err(engine_response)?;
    let slots: Vec<SlotResponse> = slots.into_iter().map(Into::into).collect();
    Ok(Json(slots))
}

/// Create a lecture.
#[utoipa::path(
    post,
    path = "/lectures",
    request_body = CreateLectureRequest,
    responses(
        (status = 201, description = "Lecture created", body = LectureResponse),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn create_lecture_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLectureRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let lecture = Lecture {
        id: Uuid::new_v4(),
        name: req.name,
        video_url: req.video_url,
        body: req.body,
    };
    let lecture = state
        .lectures
        .insert(lecture)
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?;
    Ok((StatusCode::CREATED, Json(LectureResponse::from(lecture))))
}

/// Attach a lecture to a challenge at an explicit sequence position.
#[utoipa::path(
    post,
    path = "/challenges/{challenge_id}/lectures",
    request_body = AttachLectureRequest,
    responses(
        (status = 201, description = "Schedule slot created", body = SlotResponse),
        (status = 400, description = "Invalid sequence"),
        (status = 404, description = "Challenge or lecture not found")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge to attach to.")
    )
)]
pub async fn attach_lecture_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
    Json(req): Json<AttachLectureRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let slot = state
        .schedule
        .attach_lecture(challenge_id, req.lecture_id, req.sequence)
        .await
        .map_err(engine_response)?;
    Ok((StatusCode::CREATED, Json(SlotResponse::from(slot))))
}

/// One page of the learner × slot completion matrix.
#[utoipa::path(
    get,
    path = "/challenges/{challenge_id}/completion",
    responses(
        (status = 200, description = "Completion matrix page", body = MatrixResponse),
        (status = 404, description = "Challenge not found")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge to review."),
        MatrixQuery
    )
)]
pub async fn completion_matrix_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
    Query(query): Query<MatrixQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = state
        .completion
        .build_matrix(challenge_id, query.page, query.page_size, query.completed_only)
        .await
        .map_err(engine_response)?;
    Ok(Json(MatrixResponse {
        rows: page.rows.into_iter().map(Into::into).collect(),
        total: page.total,
        page: query.page,
        page_size: query.page_size,
    }))
}

/// Per-slot submission rates across the enrolled cohort.
#[utoipa::path(
    get,
    path = "/challenges/{challenge_id}/submission-rates",
    responses(
        (status = 200, description = "Rates per qualifying slot", body = [SlotRateResponse]),
        (status = 404, description = "Challenge not found")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge to review.")
    )
)]
pub async fn submission_rates_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rates = state
        .completion
        .submission_rate_by_slot(challenge_id)
        .await
        .map_err(engine_response)?;
    let rates: Vec<SlotRateResponse> = rates.into_iter().map(Into::into).collect();
    Ok(Json(rates))
}

//=========================================================================================
// Learner Handlers
//=========================================================================================

/// Enroll the calling learner into a challenge.
///
/// Enrolling twice returns the existing enrollment unchanged.
#[utoipa::path(
    post,
    path = "/challenges/{challenge_id}/enrollments",
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentResponse),
        (status = 200, description = "Already enrolled", body = EnrollmentResponse),
        (status = 404, description = "Challenge not found")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge to enroll in."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<EnrollRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;

    state
        .challenges
        .find(challenge_id)
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Challenge not found".to_string()))?;

    if let Some(existing) = state
        .enrollments
        .find(user_id, challenge_id)
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?
    {
        return Ok((StatusCode::OK, Json(EnrollmentResponse::from(existing))));
    }

    let now = state.gate.now().await.map_err(engine_response)?;
    state
        .enrollments
        .ensure_learner(cohort_core::domain::Learner {
            user_id,
            name: req.name,
            email: req.email,
        })
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?;
    let enrollment = state
        .enrollments
        .insert(Enrollment {
            user_id,
            challenge_id,
            enrolled_at: now,
            refund_requested: false,
        })
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?;

    Ok((StatusCode::CREATED, Json(EnrollmentResponse::from(enrollment))))
}

/// List a challenge's slots with their current unlock state.
#[utoipa::path(
    get,
    path = "/challenges/{challenge_id}/slots",
    responses(
        (status = 200, description = "Slots in sequence order", body = [SlotStateResponse]),
        (status = 404, description = "Challenge not found"),
        (status = 503, description = "Authoritative clock unavailable")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge to list.")
    )
)]
pub async fn list_slots_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .challenges
        .find(challenge_id)
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Challenge not found".to_string()))?;

    let now = state.gate.now().await.map_err(engine_response)?;
    let slots = state
        .slots
        .list_for_challenge(challenge_id)
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?;

    let slots: Vec<SlotStateResponse> = slots
        .into_iter()
        .map(|s| SlotStateResponse {
            is_open: is_open(&s, now),
            id: s.id,
            lecture_id: s.lecture_id,
            sequence: s.sequence,
            open_at: s.open_at,
            due_at: s.due_at,
        })
        .collect();
    Ok(Json(slots))
}

/// View the lecture behind a slot, once the slot has unlocked.
///
/// Reads stay open forever after `open_at`; there is no read-side expiry.
#[utoipa::path(
    get,
    path = "/slots/{slot_id}",
    responses(
        (status = 200, description = "Lecture content", body = LectureViewResponse),
        (status = 403, description = "Slot has not unlocked yet"),
        (status = 404, description = "Slot not found")
    ),
    params(
        ("slot_id" = Uuid, Path, description = "The slot to view.")
    )
)]
pub async fn view_lecture_handler(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let slot = state
        .slots
        .find(slot_id)
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Slot not found".to_string()))?;

    if !state.gate.is_open(&slot).await.map_err(engine_response)? {
        return Err((
            StatusCode::FORBIDDEN,
            "Lecture has not opened yet".to_string(),
        ));
    }

    let lecture = state
        .lectures
        .find(slot.lecture_id)
        .await
        .map_err(|e| engine_response(EngineError::Port(e)))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Lecture not found".to_string()))?;

    Ok(Json(LectureViewResponse {
        slot: slot.into(),
        lecture: lecture.into(),
    }))
}

/// Submit an assignment for a slot.
///
/// Accepts a multipart/form-data request with `link`, `comment`, and an
/// optional `image` file part.
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/submissions",
    request_body(content_type = "multipart/form-data", description = "link, comment, and optional image parts."),
    responses(
        (status = 201, description = "Submission recorded", body = SubmissionResponse),
        (status = 400, description = "Missing link"),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Deadline has passed"),
        (status = 502, description = "Image upload failed")
    ),
    params(
        ("slot_id" = Uuid, Path, description = "The slot to submit to."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    let form = read_submission_form(multipart).await?;

    let submission = state
        .registry
        .submit(
            user_id,
            slot_id,
            NewSubmission {
                link: form.link.unwrap_or_default(),
                comment: form.comment,
                image: form.image,
            },
        )
        .await
        .map_err(engine_response)?;
    Ok((StatusCode::CREATED, Json(SubmissionResponse::from(submission))))
}

/// The calling learner's authoritative submission for a slot, if any.
#[utoipa::path(
    get,
    path = "/slots/{slot_id}/submissions/me",
    responses(
        (status = 200, description = "The submission, or null when unsubmitted", body = SubmissionResponse)
    ),
    params(
        ("slot_id" = Uuid, Path, description = "The slot to look up."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn my_submission_handler(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    let submission = state
        .registry
        .get_for_user(user_id, slot_id)
        .await
        .map_err(engine_response)?;
    Ok(Json(submission.map(SubmissionResponse::from)))
}

/// Edit an existing submission, still gated by the slot deadline.
///
/// Multipart fields mirror the submit form; send `remove_image=true` to
/// drop the stored image, or a new `image` part to replace it.
#[utoipa::path(
    put,
    path = "/submissions/{submission_id}",
    request_body(content_type = "multipart/form-data", description = "link, comment, optional image, optional remove_image flag."),
    responses(
        (status = 200, description = "Submission updated", body = SubmissionResponse),
        (status = 404, description = "Submission not found"),
        (status = 409, description = "Deadline has passed"),
        (status = 502, description = "Image upload failed")
    ),
    params(
        ("submission_id" = Uuid, Path, description = "The submission to edit.")
    )
)]
pub async fn amend_handler(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let form = read_submission_form(multipart).await?;
    let image = if form.remove_image {
        ImagePatch::Clear
    } else if let Some(upload) = form.image {
        ImagePatch::Replace(upload)
    } else {
        ImagePatch::Keep
    };

    let submission = state
        .registry
        .amend(
            submission_id,
            AmendSubmission {
                link: form.link.unwrap_or_default(),
                comment: form.comment,
                image,
            },
        )
        .await
        .map_err(engine_response)?;
    Ok(Json(SubmissionResponse::from(submission)))
}

/// Remove a submission, returning its (user, slot) pair to unsubmitted.
#[utoipa::path(
    delete,
    path = "/submissions/{submission_id}",
    responses(
        (status = 204, description = "Submission removed"),
        (status = 404, description = "Submission not found")
    ),
    params(
        ("submission_id" = Uuid, Path, description = "The submission to remove.")
    )
)]
pub async fn delete_submission_handler(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .registry
        .delete(submission_id)
        .await
        .map_err(engine_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// The calling learner's refund signal for a challenge.
#[utoipa::path(
    get,
    path = "/challenges/{challenge_id}/refund",
    responses(
        (status = 200, description = "Refund eligibility", body = RefundEligibilityResponse),
        (status = 404, description = "Not enrolled")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge to evaluate."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn refund_eligibility_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    let eligibility = state
        .refunds
        .evaluate(user_id, challenge_id)
        .await
        .map_err(engine_response)?;
    Ok(Json(RefundEligibilityResponse {
        all_submitted: eligibility.all_submitted,
        refund_requested: eligibility.refund_requested,
    }))
}

/// Flip the calling learner's refund-request flag. Idempotent.
#[utoipa::path(
    post,
    path = "/challenges/{challenge_id}/refund",
    responses(
        (status = 204, description = "Flag set (or already set)"),
        (status = 404, description = "Not enrolled")
    ),
    params(
        ("challenge_id" = Uuid, Path, description = "The challenge the refund concerns."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the learner.")
    )
)]
pub async fn request_refund_handler(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = user_id_from_headers(&headers)?;
    state
        .refunds
        .request_refund(user_id, challenge_id)
        .await
        .map_err(engine_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::ports::PortError;

    #[test]
    fn engine_failures_map_to_the_documented_statuses() {
        let (status, _) = engine_response(EngineError::Validation("bad".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = engine_response(EngineError::DeadlineExceeded {
            slot_id: Uuid::new_v4(),
            due_at: Utc::now(),
        });
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = engine_response(EngineError::ClockUnavailable("down".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = engine_response(EngineError::Port(PortError::Unexpected("db".into())));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
