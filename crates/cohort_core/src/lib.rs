pub mod access;
pub mod completion;
pub mod domain;
pub mod error;
pub mod ports;
pub mod refunds;
pub mod schedule;
pub mod submissions;

pub use access::{is_open, is_within_deadline, AccessGate};
pub use completion::CompletionService;
pub use domain::{
    Assignment, Challenge, CompletionPage, Enrollment, Learner, LearnerRow, Lecture,
    RefundEligibility, ScheduleSlot, SlotCompletion, SlotRate, Submission,
};
pub use error::{EngineError, EngineResult};
pub use ports::{
    AssignmentRepository, AuthValidator, BlobStore, ChallengeRepository, ClockSource,
    EnrollmentRepository, LectureRepository, PortError, PortResult, ScheduleSlotRepository,
    SubmissionRepository,
};
pub use refunds::RefundService;
pub use schedule::{slot_window, ScheduleService};
pub use submissions::{
    AmendSubmission, ImagePatch, ImageUpload, NewSubmission, SubmissionService,
};
