//! In-memory fakes for every port, so the engine scenarios run without
//! a database, clock RPC, or blob store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use cohort_core::domain::{
    Assignment, Challenge, Enrollment, Learner, Lecture, ScheduleSlot, Submission,
};
use cohort_core::ports::{
    AssignmentRepository, BlobStore, ChallengeRepository, ClockSource, EnrollmentRepository,
    LectureRepository, PortError, PortResult, ScheduleSlotRepository, SubmissionRepository,
};
use cohort_core::{
    AccessGate, CompletionService, RefundService, ScheduleService, SubmissionService,
};

//=========================================================================================
// Repositories
//=========================================================================================

#[derive(Default)]
pub struct InMemoryChallenges {
    rows: Mutex<HashMap<Uuid, Challenge>>,
}

#[async_trait]
impl ChallengeRepository for InMemoryChallenges {
    async fn insert(&self, challenge: Challenge) -> PortResult<Challenge> {
        self.rows
            .lock()
            .unwrap()
            .insert(challenge.id, challenge.clone());
        Ok(challenge)
    }

    async fn find(&self, challenge_id: Uuid) -> PortResult<Option<Challenge>> {
        Ok(self.rows.lock().unwrap().get(&challenge_id).cloned())
    }

    async fn update_dates(
        &self,
        challenge_id: Uuid,
        open_date: NaiveDate,
        close_date: NaiveDate,
    ) -> PortResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let challenge = rows
            .get_mut(&challenge_id)
            .ok_or_else(|| PortError::NotFound(challenge_id.to_string()))?;
        challenge.open_date = open_date;
        challenge.close_date = close_date;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLectures {
    rows: Mutex<HashMap<Uuid, Lecture>>,
}

#[async_trait]
impl LectureRepository for InMemoryLectures {
    async fn insert(&self, lecture: Lecture) -> PortResult<Lecture> {
        self.rows.lock().unwrap().insert(lecture.id, lecture.clone());
        Ok(lecture)
    }

    async fn find(&self, lecture_id: Uuid) -> PortResult<Option<Lecture>> {
        Ok(self.rows.lock().unwrap().get(&lecture_id).cloned())
    }

    async fn delete(&self, lecture_id: Uuid) -> PortResult<()> {
        self.rows.lock().unwrap().remove(&lecture_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySlots {
    rows: Mutex<Vec<ScheduleSlot>>,
    // When set, that many window updates succeed and the next one fails.
    window_update_budget: Mutex<Option<usize>>,
}

impl InMemorySlots {
    pub fn fail_window_updates_after(&self, successes: usize) {
        *self.window_update_budget.lock().unwrap() = Some(successes);
    }
}

#[async_trait]
impl ScheduleSlotRepository for InMemorySlots {
    async fn insert(&self, slot: ScheduleSlot) -> PortResult<ScheduleSlot> {
        self.rows.lock().unwrap().push(slot.clone());
        Ok(slot)
    }

    async fn find(&self, slot_id: Uuid) -> PortResult<Option<ScheduleSlot>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == slot_id)
            .cloned())
    }

    async fn list_for_challenge(&self, challenge_id: Uuid) -> PortResult<Vec<ScheduleSlot>> {
        let mut slots: Vec<ScheduleSlot> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.challenge_id == challenge_id)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.sequence, s.id));
        Ok(slots)
    }

    async fn update_window(
        &self,
        slot_id: Uuid,
        open_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> PortResult<()> {
        {
            let mut budget = self.window_update_budget.lock().unwrap();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(PortError::Unavailable("injected window-update failure".into()));
                }
                *remaining -= 1;
            }
        }
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .iter_mut()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| PortError::NotFound(slot_id.to_string()))?;
        slot.open_at = open_at;
        slot.due_at = due_at;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAssignments {
    rows: Mutex<Vec<Assignment>>,
}

#[async_trait]
impl AssignmentRepository for InMemoryAssignments {
    async fn insert(&self, assignment: Assignment) -> PortResult<Assignment> {
        self.rows.lock().unwrap().push(assignment.clone());
        Ok(assignment)
    }

    async fn find_by_lecture(&self, lecture_id: Uuid) -> PortResult<Option<Assignment>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.lecture_id == lecture_id)
            .cloned())
    }

    async fn lecture_ids_with_assignment(&self, lecture_ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        let rows = self.rows.lock().unwrap();
        Ok(lecture_ids
            .iter()
            .filter(|id| rows.iter().any(|a| a.lecture_id == **id))
            .copied()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryEnrollments {
    rows: Mutex<Vec<Enrollment>>,
    learners: Mutex<HashMap<Uuid, Learner>>,
}

impl InMemoryEnrollments {
    fn enrolled_ids(&self, challenge_id: Uuid) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.challenge_id == challenge_id)
            .map(|e| e.user_id)
            .collect();
        ids.sort();
        ids
    }

    fn resolve(&self, ids: &[Uuid]) -> Vec<Learner> {
        let learners = self.learners.lock().unwrap();
        ids.iter()
            .map(|id| learners.get(id).expect("learner registered").clone())
            .collect()
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryEnrollments {
    async fn ensure_learner(&self, learner: Learner) -> PortResult<()> {
        self.learners
            .lock()
            .unwrap()
            .entry(learner.user_id)
            .or_insert(learner);
        Ok(())
    }

    async fn insert(&self, enrollment: Enrollment) -> PortResult<Enrollment> {
        self.rows.lock().unwrap().push(enrollment.clone());
        Ok(enrollment)
    }

    async fn find(&self, user_id: Uuid, challenge_id: Uuid) -> PortResult<Option<Enrollment>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.user_id == user_id && e.challenge_id == challenge_id)
            .cloned())
    }

    async fn mark_refund_requested(&self, user_id: Uuid, challenge_id: Uuid) -> PortResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let enrollment = rows
            .iter_mut()
            .find(|e| e.user_id == user_id && e.challenge_id == challenge_id)
            .ok_or_else(|| PortError::NotFound(user_id.to_string()))?;
        enrollment.refund_requested = true;
        Ok(())
    }

    async fn count_enrolled(&self, challenge_id: Uuid) -> PortResult<u64> {
        Ok(self.enrolled_ids(challenge_id).len() as u64)
    }

    async fn count_enrolled_in(&self, challenge_id: Uuid, user_ids: &[Uuid]) -> PortResult<u64> {
        Ok(self
            .enrolled_ids(challenge_id)
            .iter()
            .filter(|id| user_ids.contains(id))
            .count() as u64)
    }

    async fn list_learners(
        &self,
        challenge_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> PortResult<Vec<Learner>> {
        let page: Vec<Uuid> = self
            .enrolled_ids(challenge_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(self.resolve(&page))
    }

    async fn list_learners_in(
        &self,
        challenge_id: Uuid,
        user_ids: &[Uuid],
        offset: u64,
        limit: u64,
    ) -> PortResult<Vec<Learner>> {
        let page: Vec<Uuid> = self
            .enrolled_ids(challenge_id)
            .into_iter()
            .filter(|id| user_ids.contains(id))
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(self.resolve(&page))
    }
}

#[derive(Default)]
pub struct InMemorySubmissions {
    rows: Mutex<Vec<Submission>>,
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissions {
    async fn insert(&self, submission: Submission) -> PortResult<Submission> {
        self.rows.lock().unwrap().push(submission.clone());
        Ok(submission)
    }

    async fn find(&self, submission_id: Uuid) -> PortResult<Option<Submission>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == submission_id)
            .cloned())
    }

    async fn latest_for(&self, user_id: Uuid, slot_id: Uuid) -> PortResult<Option<Submission>> {
        Ok(self.list_for(user_id, slot_id).await?.into_iter().next())
    }

    async fn list_for(&self, user_id: Uuid, slot_id: Uuid) -> PortResult<Vec<Submission>> {
        let mut rows: Vec<Submission> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id && s.slot_id == slot_id && s.is_submit)
            .cloned()
            .collect();
        rows.sort_by_key(|s| std::cmp::Reverse(s.submitted_at));
        Ok(rows)
    }

    async fn submitted_user_ids(&self, slot_id: Uuid) -> PortResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.slot_id == slot_id && s.is_submit)
            .map(|s| s.user_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn update_content(
        &self,
        submission_id: Uuid,
        link: &str,
        comment: Option<&str>,
        image_url: Option<&str>,
    ) -> PortResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let submission = rows
            .iter_mut()
            .find(|s| s.id == submission_id)
            .ok_or_else(|| PortError::NotFound(submission_id.to_string()))?;
        submission.link = link.to_string();
        submission.comment = comment.map(str::to_string);
        submission.image_url = image_url.map(str::to_string);
        Ok(())
    }

    async fn delete(&self, submission_id: Uuid) -> PortResult<()> {
        self.rows.lock().unwrap().retain(|s| s.id != submission_id);
        Ok(())
    }
}

//=========================================================================================
// Collaborators
//=========================================================================================

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    unreachable: AtomicBool,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            unreachable: AtomicBool::new(false),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClockSource for FixedClock {
    async fn now(&self) -> PortResult<DateTime<Utc>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("clock offline".into()));
        }
        Ok(*self.now.lock().unwrap())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    pub uploaded: Mutex<Vec<String>>,
    pub remove_attempts: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
    fail_upload: AtomicBool,
    fail_remove: AtomicBool,
}

impl MemoryBlobStore {
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, _data: Vec<u8>, namespace: &str, filename: &str) -> PortResult<String> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("blob store offline".into()));
        }
        let url = format!("https://blobs.test/{}/{}-{}", namespace, Uuid::new_v4(), filename);
        self.uploaded.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn remove(&self, url: &str) -> PortResult<()> {
        self.remove_attempts.lock().unwrap().push(url.to_string());
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("blob store offline".into()));
        }
        self.removed.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

//=========================================================================================
// TestWorld
//=========================================================================================

/// The whole engine wired over in-memory fakes.
pub struct TestWorld {
    pub slots: Arc<InMemorySlots>,
    pub assignments: Arc<InMemoryAssignments>,
    pub enrollments: Arc<InMemoryEnrollments>,
    pub clock: Arc<FixedClock>,
    pub storage: Arc<MemoryBlobStore>,
    pub schedule: ScheduleService,
    pub registry: SubmissionService,
    pub completion: CompletionService,
    pub refunds: RefundService,
    lectures: Arc<InMemoryLectures>,
}

impl TestWorld {
    pub fn new(now: DateTime<Utc>) -> Self {
        let challenges = Arc::new(InMemoryChallenges::default());
        let lectures = Arc::new(InMemoryLectures::default());
        let slots = Arc::new(InMemorySlots::default());
        let assignments = Arc::new(InMemoryAssignments::default());
        let enrollments = Arc::new(InMemoryEnrollments::default());
        let submissions = Arc::new(InMemorySubmissions::default());
        let clock = Arc::new(FixedClock::at(now));
        let storage = Arc::new(MemoryBlobStore::default());

        let gate = AccessGate::new(clock.clone());
        let schedule = ScheduleService::new(challenges.clone(), lectures.clone(), slots.clone());
        let registry = SubmissionService::new(
            slots.clone(),
            submissions.clone(),
            gate,
            storage.clone(),
        );
        let completion = CompletionService::new(
            challenges,
            slots.clone(),
            assignments.clone(),
            enrollments.clone(),
            submissions,
        );
        let refunds = RefundService::new(completion.clone(), enrollments.clone());

        Self {
            slots,
            assignments,
            enrollments,
            clock,
            storage,
            schedule,
            registry,
            completion,
            refunds,
            lectures,
        }
    }

    /// Inserts a lecture, optionally with an assignment attached.
    pub async fn new_lecture(&self, name: &str, with_assignment: bool) -> Uuid {
        let lecture = Lecture {
            id: Uuid::new_v4(),
            name: name.to_string(),
            video_url: None,
            body: None,
        };
        let lecture = self.lectures.insert(lecture).await.unwrap();
        if with_assignment {
            self.assignments
                .insert(Assignment {
                    id: Uuid::new_v4(),
                    lecture_id: lecture.id,
                    title: format!("{name} assignment"),
                    body: "submit a link".into(),
                })
                .await
                .unwrap();
        }
        lecture.id
    }

    /// Enrolls learner `n` (deterministic id so pages order predictably).
    pub async fn enroll(&self, challenge_id: Uuid, n: u32, enrolled_at: DateTime<Utc>) -> Uuid {
        let user_id = Uuid::from_u128(u128::from(n));
        self.enrollments
            .ensure_learner(Learner {
                user_id,
                name: format!("learner-{n}"),
                email: format!("learner-{n}@example.com"),
            })
            .await
            .unwrap();
        self.enrollments
            .insert(Enrollment {
                user_id,
                challenge_id,
                enrolled_at,
                refund_requested: false,
            })
            .await
            .unwrap();
        user_id
    }
}
