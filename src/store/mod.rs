// src/store/mod.rs

//! Persistence seam.
//!
//! Workflows only talk to `PortalStore` and the `StoreTx` handles it hands out.
//! `PgStore` backs the running service; `MemoryStore` backs the test suite.

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        pilot::{
            EnrollStatus, Enrollment, Lesson, LessonFiles, NewPilot, Note, Pilot, PilotOwner,
            StoredFile,
        },
        quiz::{AttemptSummary, CreateQuizRequest, NewAttempt, QuizBundle, QuizResult},
        schedule::{NewSchedule, Schedule, ScheduleStatus},
        user::{NewUser, User},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PortalStore: Send + Sync {
    /// Opens a transaction. Dropping the handle without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;

    // users
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    // pilots, lessons, notes, files
    async fn insert_pilot(&self, pilot: NewPilot) -> Result<Pilot, AppError>;
    async fn find_pilot(&self, id: i64) -> Result<Option<Pilot>, AppError>;
    async fn find_pilot_owner(&self, pilot_id: i64) -> Result<Option<PilotOwner>, AppError>;
    async fn insert_file(&self, key: &str, content_type: Option<&str>) -> Result<StoredFile, AppError>;
    async fn find_file(&self, id: i64) -> Result<Option<StoredFile>, AppError>;
    async fn set_pilot_thumbnail(&self, pilot_id: i64, file_id: i64) -> Result<(), AppError>;
    async fn insert_lesson(
        &self,
        pilot_id: i64,
        title: &str,
        video_file_id: Option<i64>,
    ) -> Result<Lesson, AppError>;
    async fn find_lesson(&self, id: i64) -> Result<Option<Lesson>, AppError>;
    async fn insert_note(&self, lesson_id: i64, title: &str, file_id: Option<i64>) -> Result<Note, AppError>;
    async fn record_lesson_progress(&self, lesson_id: i64, user_id: i64) -> Result<(), AppError>;

    // enrollment
    async fn request_enrollment(&self, pilot_id: i64, user_id: i64) -> Result<Enrollment, AppError>;
    async fn find_enrollment(&self, id: i64) -> Result<Option<Enrollment>, AppError>;
    async fn set_enrollment_status(&self, id: i64, status: EnrollStatus) -> Result<Enrollment, AppError>;
    async fn enrollment_status(&self, pilot_id: i64, user_id: i64) -> Result<Option<EnrollStatus>, AppError>;

    // quizzes
    /// Creates quiz, settings, questions and options atomically. When the
    /// quiz is the exam, the flag is cleared on the pilot's other quizzes.
    async fn create_quiz(&self, pilot_id: i64, quiz: &CreateQuizRequest) -> Result<QuizBundle, AppError>;
    async fn load_quiz(&self, quiz_info_id: i64) -> Result<Option<QuizBundle>, AppError>;
    async fn latest_attempt(&self, user_id: i64, quiz_info_id: i64) -> Result<Option<AttemptSummary>, AppError>;
    /// True when the user has a passing result on any quiz of the pilot.
    async fn has_passed_pilot_quiz(&self, pilot_id: i64, user_id: i64) -> Result<bool, AppError>;

    // schedules
    async fn find_pending_schedule(&self, pilot_id: i64, user_id: i64) -> Result<Option<Schedule>, AppError>;
    /// Fails with `PendingScheduleExists` when a PENDING row for the pair already exists.
    async fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, AppError>;
    async fn find_schedule(&self, id: i64) -> Result<Option<Schedule>, AppError>;
    /// Moves a PENDING schedule to `to`. Returns `None` if the row is no longer PENDING.
    async fn transition_schedule(
        &self,
        id: i64,
        to: ScheduleStatus,
        final_message: Option<&str>,
    ) -> Result<Option<Schedule>, AppError>;
    async fn list_schedules_for_user(&self, user_id: i64) -> Result<Vec<Schedule>, AppError>;
    async fn list_schedules_for_owner(&self, owner_id: i64) -> Result<Vec<Schedule>, AppError>;
}

/// Transactional handle. Writes become visible only after `commit`.
#[async_trait]
pub trait StoreTx: Send {
    /// Counts the user's attempts on a quiz and holds a lock that serializes
    /// the user's submissions until the transaction ends.
    async fn count_attempts(&mut self, user_id: i64, quiz_info_id: i64) -> Result<i64, AppError>;
    async fn insert_attempt(&mut self, attempt: &NewAttempt) -> Result<QuizResult, AppError>;

    /// Applies the statement budget for long fan-out work.
    async fn set_timeout(&mut self, seconds: u64) -> Result<(), AppError>;

    async fn quiz_ids_for_pilot(&mut self, pilot_id: i64) -> Result<Vec<i64>, AppError>;
    async fn attempt_ids_for_quiz(&mut self, quiz_info_id: i64) -> Result<Vec<i64>, AppError>;
    async fn delete_user_answers(&mut self, attempt_id: i64) -> Result<u64, AppError>;
    async fn delete_quiz_result(&mut self, attempt_id: i64) -> Result<u64, AppError>;
    async fn delete_attempts(&mut self, quiz_info_id: i64) -> Result<u64, AppError>;
    async fn delete_options(&mut self, quiz_info_id: i64) -> Result<u64, AppError>;
    async fn delete_questions(&mut self, quiz_info_id: i64) -> Result<u64, AppError>;
    async fn delete_quiz_settings(&mut self, quiz_info_id: i64) -> Result<u64, AppError>;
    async fn delete_quizzes(&mut self, pilot_id: i64) -> Result<u64, AppError>;
    async fn delete_enrollments(&mut self, pilot_id: i64) -> Result<u64, AppError>;
    async fn delete_schedules(&mut self, pilot_id: i64) -> Result<u64, AppError>;
    async fn lessons_for_pilot(&mut self, pilot_id: i64) -> Result<Vec<LessonFiles>, AppError>;
    async fn delete_lesson_progress(&mut self, lesson_id: i64) -> Result<u64, AppError>;
    async fn delete_note(&mut self, note_id: i64) -> Result<u64, AppError>;
    async fn delete_lesson(&mut self, lesson_id: i64) -> Result<u64, AppError>;
    async fn delete_file(&mut self, file_id: i64) -> Result<u64, AppError>;
    async fn pilot_thumbnail(&mut self, pilot_id: i64) -> Result<Option<StoredFile>, AppError>;
    async fn delete_pilot(&mut self, pilot_id: i64) -> Result<u64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
