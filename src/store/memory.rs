// src/store/memory.rs

//! In-process store with the same observable behavior as `PgStore`,
//! including transactional rollback and foreign-key refusal on delete.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{PortalStore, StoreTx};
use crate::{
    error::AppError,
    models::{
        pilot::{
            EnrollStatus, Enrollment, Lesson, LessonFiles, NewPilot, Note, NoteFile, Pilot,
            PilotOwner, StoredFile,
        },
        quiz::{
            AttemptSummary, CreateQuizRequest, NewAttempt, QuestionWithOptions, Question,
            QuizAttempt, QuizBundle, QuizInfo, QuizOption, QuizResult, QuizSettings, UserAnswer,
        },
        schedule::{NewSchedule, Schedule, ScheduleStatus},
        user::{NewUser, User},
    },
};

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    files: BTreeMap<i64, StoredFile>,
    pilots: BTreeMap<i64, Pilot>,
    lessons: BTreeMap<i64, Lesson>,
    notes: BTreeMap<i64, Note>,
    /// id -> (lesson_id, user_id)
    lesson_progress: BTreeMap<i64, (i64, i64)>,
    enrollments: BTreeMap<i64, Enrollment>,
    quizzes: BTreeMap<i64, QuizInfo>,
    settings: BTreeMap<i64, QuizSettings>,
    questions: BTreeMap<i64, Question>,
    options: BTreeMap<i64, QuizOption>,
    attempts: BTreeMap<i64, QuizAttempt>,
    answers: BTreeMap<i64, UserAnswer>,
    results: BTreeMap<i64, QuizResult>,
    schedules: BTreeMap<i64, Schedule>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn quiz_bundle(&self, quiz_info_id: i64) -> Option<QuizBundle> {
        let info = self.quizzes.get(&quiz_info_id)?.clone();
        let settings = self
            .settings
            .values()
            .find(|s| s.quiz_info_id == quiz_info_id)
            .cloned();
        let mut questions: Vec<QuestionWithOptions> = self
            .questions
            .values()
            .filter(|q| q.quiz_info_id == quiz_info_id)
            .map(|q| {
                let mut options: Vec<QuizOption> = self
                    .options
                    .values()
                    .filter(|o| o.question_id == q.id)
                    .cloned()
                    .collect();
                options.sort_by_key(|o| (o.position, o.id));
                QuestionWithOptions {
                    question: q.clone(),
                    options,
                }
            })
            .collect();
        questions.sort_by_key(|q| (q.question.position, q.question.id));
        Some(QuizBundle {
            info,
            settings,
            questions,
        })
    }

    fn pending_schedule(&self, pilot_id: i64, user_id: i64) -> Option<&Schedule> {
        self.schedules.values().find(|s| {
            s.pilot_id == pilot_id && s.user_id == user_id && s.status == ScheduleStatus::Pending
        })
    }
}

fn fk_violation(table: &str, referenced_by: &str) -> AppError {
    AppError::InternalServerError(format!(
        "update or delete on table \"{}\" violates foreign key constraint from \"{}\"",
        table, referenced_by
    ))
}

fn remove_where<V>(map: &mut BTreeMap<i64, V>, pred: impl Fn(&V) -> bool) -> u64 {
    let before = map.len();
    map.retain(|_, v| !pred(v));
    (before - map.len()) as u64
}

/// Row counts per table, for asserting that nothing was orphaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCounts {
    pub files: usize,
    pub pilots: usize,
    pub lessons: usize,
    pub notes: usize,
    pub lesson_progress: usize,
    pub enrollments: usize,
    pub quizzes: usize,
    pub quiz_settings: usize,
    pub questions: usize,
    pub options: usize,
    pub attempts: usize,
    pub user_answers: usize,
    pub results: usize,
    pub schedules: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_counts(&self) -> RowCounts {
        let t = self.tables.lock().await;
        RowCounts {
            files: t.files.len(),
            pilots: t.pilots.len(),
            lessons: t.lessons.len(),
            notes: t.notes.len(),
            lesson_progress: t.lesson_progress.len(),
            enrollments: t.enrollments.len(),
            quizzes: t.quizzes.len(),
            quiz_settings: t.settings.len(),
            questions: t.questions.len(),
            options: t.options.len(),
            attempts: t.attempts.len(),
            user_answers: t.answers.len(),
            results: t.results.len(),
            schedules: t.schedules.len(),
        }
    }

    /// All attempts of a user on a quiz, oldest first.
    pub async fn attempts_for(&self, user_id: i64, quiz_info_id: i64) -> Vec<QuizAttempt> {
        let t = self.tables.lock().await;
        t.attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quiz_info_id == quiz_info_id)
            .cloned()
            .collect()
    }

    pub async fn answers_for(&self, attempt_id: i64) -> Vec<UserAnswer> {
        let t = self.tables.lock().await;
        t.answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PortalStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }
        let id = t.next_id();
        let row = User {
            id,
            email: user.email,
            name: user.name,
            password: user.password,
            role: user.role,
            created_at: Some(Utc::now()),
        };
        t.users.insert(id, row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_pilot(&self, pilot: NewPilot) -> Result<Pilot, AppError> {
        let mut t = self.tables.lock().await;
        if !t.users.contains_key(&pilot.owner_id) {
            return Err(fk_violation("pilots", "users"));
        }
        let id = t.next_id();
        let row = Pilot {
            id,
            owner_id: pilot.owner_id,
            title: pilot.title,
            description: pilot.description,
            thumbnail_file_id: None,
            created_at: Some(Utc::now()),
        };
        t.pilots.insert(id, row.clone());
        Ok(row)
    }

    async fn find_pilot(&self, id: i64) -> Result<Option<Pilot>, AppError> {
        Ok(self.tables.lock().await.pilots.get(&id).cloned())
    }

    async fn find_pilot_owner(&self, pilot_id: i64) -> Result<Option<PilotOwner>, AppError> {
        let t = self.tables.lock().await;
        let Some(pilot) = t.pilots.get(&pilot_id) else {
            return Ok(None);
        };
        Ok(t.users.get(&pilot.owner_id).map(|owner| PilotOwner {
            pilot_id,
            pilot_title: pilot.title.clone(),
            owner_id: owner.id,
            owner_name: owner.name.clone(),
            owner_email: owner.email.clone(),
        }))
    }

    async fn insert_file(&self, key: &str, content_type: Option<&str>) -> Result<StoredFile, AppError> {
        let mut t = self.tables.lock().await;
        if t.files.values().any(|f| f.key == key) {
            return Err(AppError::Conflict(format!("File key '{}' already exists", key)));
        }
        let id = t.next_id();
        let row = StoredFile {
            id,
            key: key.to_string(),
            content_type: content_type.map(str::to_string),
            created_at: Some(Utc::now()),
        };
        t.files.insert(id, row.clone());
        Ok(row)
    }

    async fn find_file(&self, id: i64) -> Result<Option<StoredFile>, AppError> {
        Ok(self.tables.lock().await.files.get(&id).cloned())
    }

    async fn set_pilot_thumbnail(&self, pilot_id: i64, file_id: i64) -> Result<(), AppError> {
        let mut t = self.tables.lock().await;
        if !t.files.contains_key(&file_id) {
            return Err(fk_violation("pilots", "files"));
        }
        let pilot = t
            .pilots
            .get_mut(&pilot_id)
            .ok_or(AppError::NotFound("Pilot not found".to_string()))?;
        pilot.thumbnail_file_id = Some(file_id);
        Ok(())
    }

    async fn insert_lesson(
        &self,
        pilot_id: i64,
        title: &str,
        video_file_id: Option<i64>,
    ) -> Result<Lesson, AppError> {
        let mut t = self.tables.lock().await;
        if !t.pilots.contains_key(&pilot_id) {
            return Err(fk_violation("lessons", "pilots"));
        }
        let id = t.next_id();
        let row = Lesson {
            id,
            pilot_id,
            title: title.to_string(),
            video_file_id,
            created_at: Some(Utc::now()),
        };
        t.lessons.insert(id, row.clone());
        Ok(row)
    }

    async fn find_lesson(&self, id: i64) -> Result<Option<Lesson>, AppError> {
        Ok(self.tables.lock().await.lessons.get(&id).cloned())
    }

    async fn insert_note(&self, lesson_id: i64, title: &str, file_id: Option<i64>) -> Result<Note, AppError> {
        let mut t = self.tables.lock().await;
        if !t.lessons.contains_key(&lesson_id) {
            return Err(fk_violation("notes", "lessons"));
        }
        let id = t.next_id();
        let row = Note {
            id,
            lesson_id,
            title: title.to_string(),
            file_id,
        };
        t.notes.insert(id, row.clone());
        Ok(row)
    }

    async fn record_lesson_progress(&self, lesson_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut t = self.tables.lock().await;
        if !t.lessons.contains_key(&lesson_id) {
            return Err(fk_violation("lesson_progress", "lessons"));
        }
        if t.lesson_progress.values().any(|&(l, u)| l == lesson_id && u == user_id) {
            return Ok(());
        }
        let id = t.next_id();
        t.lesson_progress.insert(id, (lesson_id, user_id));
        Ok(())
    }

    async fn request_enrollment(&self, pilot_id: i64, user_id: i64) -> Result<Enrollment, AppError> {
        let mut t = self.tables.lock().await;
        if !t.pilots.contains_key(&pilot_id) {
            return Err(fk_violation("enroll_activity", "pilots"));
        }
        if let Some(existing) = t
            .enrollments
            .values_mut()
            .find(|e| e.pilot_id == pilot_id && e.user_id == user_id)
        {
            if existing.status == EnrollStatus::Rejected {
                existing.status = EnrollStatus::Pending;
            }
            return Ok(existing.clone());
        }
        let id = t.next_id();
        let row = Enrollment {
            id,
            pilot_id,
            user_id,
            status: EnrollStatus::Pending,
            created_at: Some(Utc::now()),
        };
        t.enrollments.insert(id, row.clone());
        Ok(row)
    }

    async fn find_enrollment(&self, id: i64) -> Result<Option<Enrollment>, AppError> {
        Ok(self.tables.lock().await.enrollments.get(&id).cloned())
    }

    async fn set_enrollment_status(&self, id: i64, status: EnrollStatus) -> Result<Enrollment, AppError> {
        let mut t = self.tables.lock().await;
        let row = t
            .enrollments
            .get_mut(&id)
            .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;
        row.status = status;
        Ok(row.clone())
    }

    async fn enrollment_status(&self, pilot_id: i64, user_id: i64) -> Result<Option<EnrollStatus>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.enrollments
            .values()
            .find(|e| e.pilot_id == pilot_id && e.user_id == user_id)
            .map(|e| e.status))
    }

    async fn create_quiz(&self, pilot_id: i64, quiz: &CreateQuizRequest) -> Result<QuizBundle, AppError> {
        let mut t = self.tables.lock().await;
        if !t.pilots.contains_key(&pilot_id) {
            return Err(fk_violation("quiz_info", "pilots"));
        }
        if quiz.set_as_exam {
            for other in t.quizzes.values_mut().filter(|q| q.pilot_id == pilot_id) {
                other.set_as_exam = false;
            }
        }

        let quiz_id = t.next_id();
        t.quizzes.insert(
            quiz_id,
            QuizInfo {
                id: quiz_id,
                pilot_id,
                title: quiz.title.clone(),
                summary: quiz.summary.clone(),
                set_as_exam: quiz.set_as_exam,
                created_at: Some(Utc::now()),
            },
        );

        let settings_id = t.next_id();
        t.settings.insert(
            settings_id,
            QuizSettings {
                id: settings_id,
                quiz_info_id: quiz_id,
                time_limit: quiz.settings.time_limit,
                passing_grade: quiz.settings.passing_grade,
                attempts_allowed: quiz.settings.attempts_allowed,
                question_order: quiz.settings.question_order.clone(),
                show_feedback: quiz.settings.show_feedback,
                show_correct_answers: quiz.settings.show_correct_answers,
            },
        );

        for (q_pos, input) in quiz.questions.iter().enumerate() {
            let question_id = t.next_id();
            t.questions.insert(
                question_id,
                Question {
                    id: question_id,
                    quiz_info_id: quiz_id,
                    position: q_pos as i32,
                    text: input.text.clone(),
                    question_type: input.question_type,
                    points: input.points,
                    answer_required: input.answer_required,
                    randomize: input.randomize,
                },
            );
            for (o_pos, option) in input.options.iter().enumerate() {
                let option_id = t.next_id();
                t.options.insert(
                    option_id,
                    QuizOption {
                        id: option_id,
                        question_id,
                        position: o_pos as i32,
                        text: option.text.clone(),
                        is_correct: option.is_correct,
                    },
                );
            }
        }

        t.quiz_bundle(quiz_id)
            .ok_or(AppError::InternalServerError("Quiz vanished after insert".to_string()))
    }

    async fn load_quiz(&self, quiz_info_id: i64) -> Result<Option<QuizBundle>, AppError> {
        Ok(self.tables.lock().await.quiz_bundle(quiz_info_id))
    }

    async fn latest_attempt(&self, user_id: i64, quiz_info_id: i64) -> Result<Option<AttemptSummary>, AppError> {
        let t = self.tables.lock().await;
        // Same-instant attempts are ordered by id.
        let latest = t
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quiz_info_id == quiz_info_id)
            .max_by_key(|a| (a.created_at, a.id));
        Ok(latest.and_then(|attempt| {
            t.results
                .values()
                .find(|r| r.attempt_id == attempt.id)
                .map(|r| AttemptSummary {
                    attempt_id: attempt.id,
                    quiz_info_id,
                    score: r.score,
                    passed: r.passed,
                    feedback: r.feedback.clone(),
                    created_at: attempt.created_at,
                })
        }))
    }

    async fn has_passed_pilot_quiz(&self, pilot_id: i64, user_id: i64) -> Result<bool, AppError> {
        let t = self.tables.lock().await;
        Ok(t.attempts.values().any(|a| {
            a.user_id == user_id
                && t.quizzes.get(&a.quiz_info_id).is_some_and(|q| q.pilot_id == pilot_id)
                && t.results.values().any(|r| r.attempt_id == a.id && r.passed)
        }))
    }

    async fn find_pending_schedule(&self, pilot_id: i64, user_id: i64) -> Result<Option<Schedule>, AppError> {
        Ok(self.tables.lock().await.pending_schedule(pilot_id, user_id).cloned())
    }

    async fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, AppError> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t.pending_schedule(schedule.pilot_id, schedule.user_id) {
            return Err(AppError::PendingScheduleExists(existing.scheduled_date_time));
        }
        if !t.pilots.contains_key(&schedule.pilot_id) {
            return Err(fk_violation("schedules", "pilots"));
        }
        let id = t.next_id();
        let now = Utc::now();
        let row = Schedule {
            id,
            pilot_id: schedule.pilot_id,
            user_id: schedule.user_id,
            owner_id: schedule.owner_id,
            scheduled_date_time: schedule.scheduled_date_time,
            status: ScheduleStatus::Pending,
            message: schedule.message,
            final_message: None,
            created_at: now,
            updated_at: now,
        };
        t.schedules.insert(id, row.clone());
        Ok(row)
    }

    async fn find_schedule(&self, id: i64) -> Result<Option<Schedule>, AppError> {
        Ok(self.tables.lock().await.schedules.get(&id).cloned())
    }

    async fn transition_schedule(
        &self,
        id: i64,
        to: ScheduleStatus,
        final_message: Option<&str>,
    ) -> Result<Option<Schedule>, AppError> {
        let mut t = self.tables.lock().await;
        match t.schedules.get_mut(&id) {
            Some(row) if row.status == ScheduleStatus::Pending => {
                row.status = to;
                row.final_message = final_message.map(str::to_string);
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_schedules_for_user(&self, user_id: i64) -> Result<Vec<Schedule>, AppError> {
        let t = self.tables.lock().await;
        let mut rows: Vec<Schedule> = t
            .schedules
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scheduled_date_time.cmp(&a.scheduled_date_time));
        Ok(rows)
    }

    async fn list_schedules_for_owner(&self, owner_id: i64) -> Result<Vec<Schedule>, AppError> {
        let t = self.tables.lock().await;
        let mut rows: Vec<Schedule> = t
            .schedules
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scheduled_date_time.cmp(&a.scheduled_date_time));
        Ok(rows)
    }
}

/// Holds the store lock for its whole lifetime and works on a private copy.
/// `commit` publishes the copy; dropping discards it.
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn count_attempts(&mut self, user_id: i64, quiz_info_id: i64) -> Result<i64, AppError> {
        // The transaction already holds the store lock.
        Ok(self
            .working
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quiz_info_id == quiz_info_id)
            .count() as i64)
    }

    async fn insert_attempt(&mut self, attempt: &NewAttempt) -> Result<QuizResult, AppError> {
        let t = &mut self.working;
        if !t.quizzes.contains_key(&attempt.quiz_info_id) {
            return Err(fk_violation("quiz_attempts", "quiz_info"));
        }
        let attempt_id = t.next_id();
        t.attempts.insert(
            attempt_id,
            QuizAttempt {
                id: attempt_id,
                user_id: attempt.user_id,
                quiz_info_id: attempt.quiz_info_id,
                created_at: Utc::now(),
            },
        );
        for answer in &attempt.answers {
            if !t.questions.contains_key(&answer.question_id) {
                return Err(fk_violation("user_answers", "questions"));
            }
            let id = t.next_id();
            t.answers.insert(
                id,
                UserAnswer {
                    id,
                    attempt_id,
                    question_id: answer.question_id,
                    selected_option_ids: answer.selected_option_ids.clone(),
                },
            );
        }
        let result_id = t.next_id();
        let result = QuizResult {
            id: result_id,
            attempt_id,
            score: attempt.score,
            passed: attempt.passed,
            feedback: attempt.feedback.clone(),
        };
        t.results.insert(result_id, result.clone());
        Ok(result)
    }

    async fn set_timeout(&mut self, _seconds: u64) -> Result<(), AppError> {
        Ok(())
    }

    async fn quiz_ids_for_pilot(&mut self, pilot_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self
            .working
            .quizzes
            .values()
            .filter(|q| q.pilot_id == pilot_id)
            .map(|q| q.id)
            .collect())
    }

    async fn attempt_ids_for_quiz(&mut self, quiz_info_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self
            .working
            .attempts
            .values()
            .filter(|a| a.quiz_info_id == quiz_info_id)
            .map(|a| a.id)
            .collect())
    }

    async fn delete_user_answers(&mut self, attempt_id: i64) -> Result<u64, AppError> {
        Ok(remove_where(&mut self.working.answers, |a| a.attempt_id == attempt_id))
    }

    async fn delete_quiz_result(&mut self, attempt_id: i64) -> Result<u64, AppError> {
        Ok(remove_where(&mut self.working.results, |r| r.attempt_id == attempt_id))
    }

    async fn delete_attempts(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        let t = &mut self.working;
        let doomed: Vec<i64> = t
            .attempts
            .values()
            .filter(|a| a.quiz_info_id == quiz_info_id)
            .map(|a| a.id)
            .collect();
        if t.answers.values().any(|a| doomed.contains(&a.attempt_id)) {
            return Err(fk_violation("quiz_attempts", "user_answers"));
        }
        if t.results.values().any(|r| doomed.contains(&r.attempt_id)) {
            return Err(fk_violation("quiz_attempts", "quiz_results"));
        }
        Ok(remove_where(&mut t.attempts, |a| a.quiz_info_id == quiz_info_id))
    }

    async fn delete_options(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        let t = &mut self.working;
        let question_ids: Vec<i64> = t
            .questions
            .values()
            .filter(|q| q.quiz_info_id == quiz_info_id)
            .map(|q| q.id)
            .collect();
        Ok(remove_where(&mut t.options, |o| question_ids.contains(&o.question_id)))
    }

    async fn delete_questions(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        let t = &mut self.working;
        let doomed: Vec<i64> = t
            .questions
            .values()
            .filter(|q| q.quiz_info_id == quiz_info_id)
            .map(|q| q.id)
            .collect();
        if t.options.values().any(|o| doomed.contains(&o.question_id)) {
            return Err(fk_violation("questions", "options"));
        }
        if t.answers.values().any(|a| doomed.contains(&a.question_id)) {
            return Err(fk_violation("questions", "user_answers"));
        }
        Ok(remove_where(&mut t.questions, |q| q.quiz_info_id == quiz_info_id))
    }

    async fn delete_quiz_settings(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        Ok(remove_where(&mut self.working.settings, |s| s.quiz_info_id == quiz_info_id))
    }

    async fn delete_quizzes(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        let t = &mut self.working;
        let doomed: Vec<i64> = t
            .quizzes
            .values()
            .filter(|q| q.pilot_id == pilot_id)
            .map(|q| q.id)
            .collect();
        if t.questions.values().any(|q| doomed.contains(&q.quiz_info_id)) {
            return Err(fk_violation("quiz_info", "questions"));
        }
        if t.attempts.values().any(|a| doomed.contains(&a.quiz_info_id)) {
            return Err(fk_violation("quiz_info", "quiz_attempts"));
        }
        if t.settings.values().any(|s| doomed.contains(&s.quiz_info_id)) {
            return Err(fk_violation("quiz_info", "quiz_settings"));
        }
        Ok(remove_where(&mut t.quizzes, |q| q.pilot_id == pilot_id))
    }

    async fn delete_enrollments(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        Ok(remove_where(&mut self.working.enrollments, |e| e.pilot_id == pilot_id))
    }

    async fn delete_schedules(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        Ok(remove_where(&mut self.working.schedules, |s| s.pilot_id == pilot_id))
    }

    async fn lessons_for_pilot(&mut self, pilot_id: i64) -> Result<Vec<LessonFiles>, AppError> {
        let t = &self.working;
        Ok(t.lessons
            .values()
            .filter(|l| l.pilot_id == pilot_id)
            .map(|lesson| LessonFiles {
                lesson_id: lesson.id,
                video: lesson.video_file_id.and_then(|id| t.files.get(&id).cloned()),
                notes: t
                    .notes
                    .values()
                    .filter(|n| n.lesson_id == lesson.id)
                    .map(|n| NoteFile {
                        note_id: n.id,
                        file: n.file_id.and_then(|id| t.files.get(&id).cloned()),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn delete_lesson_progress(&mut self, lesson_id: i64) -> Result<u64, AppError> {
        Ok(remove_where(&mut self.working.lesson_progress, |&(l, _)| l == lesson_id))
    }

    async fn delete_note(&mut self, note_id: i64) -> Result<u64, AppError> {
        Ok(self.working.notes.remove(&note_id).map_or(0, |_| 1))
    }

    async fn delete_lesson(&mut self, lesson_id: i64) -> Result<u64, AppError> {
        let t = &mut self.working;
        if t.notes.values().any(|n| n.lesson_id == lesson_id) {
            return Err(fk_violation("lessons", "notes"));
        }
        if t.lesson_progress.values().any(|&(l, _)| l == lesson_id) {
            return Err(fk_violation("lessons", "lesson_progress"));
        }
        Ok(t.lessons.remove(&lesson_id).map_or(0, |_| 1))
    }

    async fn delete_file(&mut self, file_id: i64) -> Result<u64, AppError> {
        let t = &mut self.working;
        // ON DELETE SET NULL on every referencing column.
        for lesson in t.lessons.values_mut() {
            if lesson.video_file_id == Some(file_id) {
                lesson.video_file_id = None;
            }
        }
        for note in t.notes.values_mut() {
            if note.file_id == Some(file_id) {
                note.file_id = None;
            }
        }
        for pilot in t.pilots.values_mut() {
            if pilot.thumbnail_file_id == Some(file_id) {
                pilot.thumbnail_file_id = None;
            }
        }
        Ok(t.files.remove(&file_id).map_or(0, |_| 1))
    }

    async fn pilot_thumbnail(&mut self, pilot_id: i64) -> Result<Option<StoredFile>, AppError> {
        let t = &self.working;
        Ok(t.pilots
            .get(&pilot_id)
            .and_then(|p| p.thumbnail_file_id)
            .and_then(|id| t.files.get(&id).cloned()))
    }

    async fn delete_pilot(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        let t = &mut self.working;
        if t.lessons.values().any(|l| l.pilot_id == pilot_id) {
            return Err(fk_violation("pilots", "lessons"));
        }
        if t.quizzes.values().any(|q| q.pilot_id == pilot_id) {
            return Err(fk_violation("pilots", "quiz_info"));
        }
        if t.enrollments.values().any(|e| e.pilot_id == pilot_id) {
            return Err(fk_violation("pilots", "enroll_activity"));
        }
        if t.schedules.values().any(|s| s.pilot_id == pilot_id) {
            return Err(fk_violation("pilots", "schedules"));
        }
        Ok(t.pilots.remove(&pilot_id).map_or(0, |_| 1))
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
