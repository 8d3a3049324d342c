//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapters: the concrete implementations
//! of the repository ports from the `core` crate, one typed repository per
//! entity. It handles all interactions with the PostgreSQL database using
//! `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use cohort_core::domain::{
    Assignment, Challenge, Enrollment, Learner, Lecture, ScheduleSlot, Submission,
};
use cohort_core::ports::{
    AssignmentRepository, ChallengeRepository, EnrollmentRepository, LectureRepository, PortError,
    PortResult, ScheduleSlotRepository, SubmissionRepository,
};

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Database Handle and Migrations
//=========================================================================================

/// Owns the connection pool and hands out the typed repositories.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn challenges(&self) -> PgChallengeRepository {
        PgChallengeRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn lectures(&self) -> PgLectureRepository {
        PgLectureRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn slots(&self) -> PgScheduleSlotRepository {
        PgScheduleSlotRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn assignments(&self) -> PgAssignmentRepository {
        PgAssignmentRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn enrollments(&self) -> PgEnrollmentRepository {
        PgEnrollmentRepository {
            pool: self.pool.clone(),
        }
    }

    pub fn submissions(&self) -> PgSubmissionRepository {
        PgSubmissionRepository {
            pool: self.pool.clone(),
        }
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ChallengeRecord {
    id: Uuid,
    name: String,
    open_date: NaiveDate,
    close_date: NaiveDate,
    lecture_count: i64,
}
impl ChallengeRecord {
    fn to_domain(self) -> Challenge {
        Challenge {
            id: self.id,
            name: self.name,
            open_date: self.open_date,
            close_date: self.close_date,
            lecture_count: self.lecture_count as i32,
        }
    }
}

#[derive(FromRow)]
struct LectureRecord {
    id: Uuid,
    name: String,
    video_url: Option<String>,
    body: Option<String>,
}
impl LectureRecord {
    fn to_domain(self) -> Lecture {
        Lecture {
            id: self.id,
            name: self.name,
            video_url: self.video_url,
            body: self.body,
        }
    }
}

#[derive(FromRow)]
struct SlotRecord {
    id: Uuid,
    challenge_id: Uuid,
    lecture_id: Uuid,
    sequence: i32,
    open_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
}
impl SlotRecord {
    fn to_domain(self) -> ScheduleSlot {
        ScheduleSlot {
            id: self.id,
            challenge_id: self.challenge_id,
            lecture_id: self.lecture_id,
            sequence: self.sequence,
            open_at: self.open_at,
            due_at: self.due_at,
        }
    }
}

#[derive(FromRow)]
struct AssignmentRecord {
    id: Uuid,
    lecture_id: Uuid,
    title: String,
    body: String,
}
impl AssignmentRecord {
    fn to_domain(self) -> Assignment {
        Assignment {
            id: self.id,
            lecture_id: self.lecture_id,
            title: self.title,
            body: self.body,
        }
    }
}

#[derive(FromRow)]
struct EnrollmentRecord {
    user_id: Uuid,
    challenge_id: Uuid,
    enrolled_at: DateTime<Utc>,
    refund_requested: bool,
}
impl EnrollmentRecord {
    fn to_domain(self) -> Enrollment {
        Enrollment {
            user_id: self.user_id,
            challenge_id: self.challenge_id,
            enrolled_at: self.enrolled_at,
            refund_requested: self.refund_requested,
        }
    }
}

#[derive(FromRow)]
struct LearnerRecord {
    user_id: Uuid,
    name: String,
    email: String,
}
impl LearnerRecord {
    fn to_domain(self) -> Learner {
        Learner {
            user_id: self.user_id,
            name: self.name,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRecord {
    id: Uuid,
    user_id: Uuid,
    slot_id: Uuid,
    submitted_at: DateTime<Utc>,
    is_submit: bool,
    link: String,
    comment: Option<String>,
    image_url: Option<String>,
}
impl SubmissionRecord {
    fn to_domain(self) -> Submission {
        Submission {
            id: self.id,
            user_id: self.user_id,
            slot_id: self.slot_id,
            submitted_at: self.submitted_at,
            is_submit: self.is_submit,
            link: self.link,
            comment: self.comment,
            image_url: self.image_url,
        }
    }
}

//=========================================================================================
// `ChallengeRepository` Implementation
//=========================================================================================

#[derive(Clone)]
pub struct PgChallengeRepository {
    pool: PgPool,
}

#[async_trait]
impl ChallengeRepository for PgChallengeRepository {
    async fn insert(&self, challenge: Challenge) -> PortResult<Challenge> {
        sqlx::query("INSERT INTO challenges (id, name, open_date, close_date) VALUES ($1, $2, $3, $4)")
            .bind(challenge.id)
            .bind(&challenge.name)
            .bind(challenge.open_date)
            .bind(challenge.close_date)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(challenge)
    }

    async fn find(&self, challenge_id: Uuid) -> PortResult<Option<Challenge>> {
        let record = sqlx::query_as::<_, ChallengeRecord>(
            "SELECT c.id, c.name, c.open_date, c.close_date, \
             (SELECT COUNT(*) FROM schedule_slots s WHERE s.challenge_id = c.id) AS lecture_count \
             FROM challenges c WHERE c.id = $1",
        )
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ChallengeRecord::to_domain))
    }

    async fn update_dates(
        &self,
        challenge_id: Uuid,
        open_date: NaiveDate,
        close_date: NaiveDate,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE challenges SET open_date = $2, close_date = $3 WHERE id = $1")
            .bind(challenge_id)
            .bind(open_date)
            .bind(close_date)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Challenge {} not found",
                challenge_id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `LectureRepository` Implementation
//=========================================================================================

#[derive(Clone)]
pub struct PgLectureRepository {
    pool: PgPool,
}

#[async_trait]
impl LectureRepository for PgLectureRepository {
    async fn insert(&self, lecture: Lecture) -> PortResult<Lecture> {
        sqlx::query("INSERT INTO lectures (id, name, video_url, body) VALUES ($1, $2, $3, $4)")
            .bind(lecture.id)
            .bind(&lecture.name)
            .bind(&lecture.video_url)
            .bind(&lecture.body)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(lecture)
    }

    async fn find(&self, lecture_id: Uuid) -> PortResult<Option<Lecture>> {
        let record = sqlx::query_as::<_, LectureRecord>(
            "SELECT id, name, video_url, body FROM lectures WHERE id = $1",
        )
        .bind(lecture_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(LectureRecord::to_domain))
    }

    async fn delete(&self, lecture_id: Uuid) -> PortResult<()> {
        // Schedule slots reference lectures with ON DELETE CASCADE.
        sqlx::query("DELETE FROM lectures WHERE id = $1")
            .bind(lecture_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `ScheduleSlotRepository` Implementation
//=========================================================================================

#[derive(Clone)]
pub struct PgScheduleSlotRepository {
    pool: PgPool,
}

#[async_trait]
impl ScheduleSlotRepository for PgScheduleSlotRepository {
    async fn insert(&self, slot: ScheduleSlot) -> PortResult<ScheduleSlot> {
        sqlx::query(
            "INSERT INTO schedule_slots (id, challenge_id, lecture_id, sequence, open_at, due_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(slot.id)
        .bind(slot.challenge_id)
        .bind(slot.lecture_id)
        .bind(slot.sequence)
        .bind(slot.open_at)
        .bind(slot.due_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(slot)
    }

    async fn find(&self, slot_id: Uuid) -> PortResult<Option<ScheduleSlot>> {
        let record = sqlx::query_as::<_, SlotRecord>(
            "SELECT id, challenge_id, lecture_id, sequence, open_at, due_at \
             FROM schedule_slots WHERE id = $1",
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SlotRecord::to_domain))
    }

    async fn list_for_challenge(&self, challenge_id: Uuid) -> PortResult<Vec<ScheduleSlot>> {
        let records = sqlx::query_as::<_, SlotRecord>(
            "SELECT id, challenge_id, lecture_id, sequence, open_at, due_at \
             FROM schedule_slots WHERE challenge_id = $1 ORDER BY sequence, id",
        )
        .bind(challenge_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SlotRecord::to_domain).collect())
    }

    async fn update_window(
        &self,
        slot_id: Uuid,
        open_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE schedule_slots SET open_at = $2, due_at = $3 WHERE id = $1")
            .bind(slot_id)
            .bind(open_at)
            .bind(due_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Slot {} not found", slot_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `AssignmentRepository` Implementation
//=========================================================================================

#[derive(Clone)]
pub struct PgAssignmentRepository {
    pool: PgPool,
}

#[async_trait]
impl AssignmentRepository for PgAssignmentRepository {
    async fn insert(&self, assignment: Assignment) -> PortResult<Assignment> {
        sqlx::query("INSERT INTO assignments (id, lecture_id, title, body) VALUES ($1, $2, $3, $4)")
            .bind(assignment.id)
            .bind(assignment.lecture_id)
            .bind(&assignment.title)
            .bind(&assignment.body)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(assignment)
    }

    async fn find_by_lecture(&self, lecture_id: Uuid) -> PortResult<Option<Assignment>> {
        let record = sqlx::query_as::<_, AssignmentRecord>(
            "SELECT id, lecture_id, title, body FROM assignments WHERE lecture_id = $1",
        )
        .bind(lecture_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(AssignmentRecord::to_domain))
    }

    async fn lecture_ids_with_assignment(&self, lecture_ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT lecture_id FROM assignments WHERE lecture_id = ANY($1)",
        )
        .bind(lecture_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }
}

//=========================================================================================
// `EnrollmentRepository` Implementation
//=========================================================================================

#[derive(Clone)]
pub struct PgEnrollmentRepository {
    pool: PgPool,
}

#[async_trait]
impl EnrollmentRepository for PgEnrollmentRepository {
    async fn ensure_learner(&self, learner: Learner) -> PortResult<()> {
        sqlx::query("INSERT INTO users (id, name, email) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING")
            .bind(learner.user_id)
            .bind(&learner.name)
            .bind(&learner.email)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn insert(&self, enrollment: Enrollment) -> PortResult<Enrollment> {
        sqlx::query(
            "INSERT INTO enrollments (user_id, challenge_id, enrolled_at, refund_requested) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(enrollment.user_id)
        .bind(enrollment.challenge_id)
        .bind(enrollment.enrolled_at)
        .bind(enrollment.refund_requested)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(enrollment)
    }

    async fn find(&self, user_id: Uuid, challenge_id: Uuid) -> PortResult<Option<Enrollment>> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(
            "SELECT user_id, challenge_id, enrolled_at, refund_requested \
             FROM enrollments WHERE user_id = $1 AND challenge_id = $2",
        )
        .bind(user_id)
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(EnrollmentRecord::to_domain))
    }

    async fn mark_refund_requested(&self, user_id: Uuid, challenge_id: Uuid) -> PortResult<()> {
        // Setting an already-true flag still matches the row, so the
        // update stays idempotent.
        let result = sqlx::query(
            "UPDATE enrollments SET refund_requested = TRUE \
             WHERE user_id = $1 AND challenge_id = $2",
        )
        .bind(user_id)
        .bind(challenge_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Enrollment for user {} not found",
                user_id
            )));
        }
        Ok(())
    }

    async fn count_enrolled(&self, challenge_id: Uuid) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE challenge_id = $1",
        )
        .bind(challenge_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u64)
    }

    async fn count_enrolled_in(&self, challenge_id: Uuid, user_ids: &[Uuid]) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE challenge_id = $1 AND user_id = ANY($2)",
        )
        .bind(challenge_id)
        .bind(user_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u64)
    }

    async fn list_learners(
        &self,
        challenge_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> PortResult<Vec<Learner>> {
        let records = sqlx::query_as::<_, LearnerRecord>(
            "SELECT u.id AS user_id, u.name, u.email \
             FROM enrollments e JOIN users u ON u.id = e.user_id \
             WHERE e.challenge_id = $1 ORDER BY u.id LIMIT $2 OFFSET $3",
        )
        .bind(challenge_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(LearnerRecord::to_domain).collect())
    }

    async fn list_learners_in(
        &self,
        challenge_id: Uuid,
        user_ids: &[Uuid],
        offset: u64,
        limit: u64,
    ) -> PortResult<Vec<Learner>> {
        let records = sqlx::query_as::<_, LearnerRecord>(
            "SELECT u.id AS user_id, u.name, u.email \
             FROM enrollments e JOIN users u ON u.id = e.user_id \
             WHERE e.challenge_id = $1 AND e.user_id = ANY($2) \
             ORDER BY u.id LIMIT $3 OFFSET $4",
        )
        .bind(challenge_id)
        .bind(user_ids)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(LearnerRecord::to_domain).collect())
    }
}

//=========================================================================================
// `SubmissionRepository` Implementation
//=========================================================================================

#[derive(Clone)]
pub struct PgSubmissionRepository {
    pool: PgPool,
}

#[async_trait]
impl SubmissionRepository for PgSubmissionRepository {
    async fn insert(&self, submission: Submission) -> PortResult<Submission> {
        sqlx::query(
            "INSERT INTO submissions (id, user_id, slot_id, submitted_at, is_submit, link, comment, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(submission.id)
        .bind(submission.user_id)
        .bind(submission.slot_id)
        .bind(submission.submitted_at)
        .bind(submission.is_submit)
        .bind(&submission.link)
        .bind(&submission.comment)
        .bind(&submission.image_url)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(submission)
    }

    async fn find(&self, submission_id: Uuid) -> PortResult<Option<Submission>> {
        let record = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT id, user_id, slot_id, submitted_at, is_submit, link, comment, image_url \
             FROM submissions WHERE id = $1",
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SubmissionRecord::to_domain))
    }

    async fn latest_for(&self, user_id: Uuid, slot_id: Uuid) -> PortResult<Option<Submission>> {
        let record = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT id, user_id, slot_id, submitted_at, is_submit, link, comment, image_url \
             FROM submissions WHERE user_id = $1 AND slot_id = $2 AND is_submit \
             ORDER BY submitted_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SubmissionRecord::to_domain))
    }

    async fn list_for(&self, user_id: Uuid, slot_id: Uuid) -> PortResult<Vec<Submission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT id, user_id, slot_id, submitted_at, is_submit, link, comment, image_url \
             FROM submissions WHERE user_id = $1 AND slot_id = $2 AND is_submit \
             ORDER BY submitted_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(slot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SubmissionRecord::to_domain).collect())
    }

    async fn submitted_user_ids(&self, slot_id: Uuid) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT user_id FROM submissions WHERE slot_id = $1 AND is_submit",
        )
        .bind(slot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn update_content(
        &self,
        submission_id: Uuid,
        link: &str,
        comment: Option<&str>,
        image_url: Option<&str>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE submissions SET link = $2, comment = $3, image_url = $4 WHERE id = $1",
        )
        .bind(submission_id)
        .bind(link)
        .bind(comment)
        .bind(image_url)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Submission {} not found",
                submission_id
            )));
        }
        Ok(())
    }

    async fn delete(&self, submission_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM submissions WHERE id = $1")
            .bind(submission_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
