//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use cohort_core::ports::{
    AuthValidator, ChallengeRepository, EnrollmentRepository, LectureRepository,
    ScheduleSlotRepository,
};
use cohort_core::{AccessGate, CompletionService, RefundService, ScheduleService, SubmissionService};

use crate::config::Config;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthValidator>,
    pub gate: AccessGate,
    pub challenges: Arc<dyn ChallengeRepository>,
    pub lectures: Arc<dyn LectureRepository>,
    pub slots: Arc<dyn ScheduleSlotRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub schedule: ScheduleService,
    pub registry: SubmissionService,
    pub completion: CompletionService,
    pub refunds: RefundService,
}
