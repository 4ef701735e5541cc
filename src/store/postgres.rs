// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::{PortalStore, StoreTx};
use crate::{
    error::AppError,
    models::{
        pilot::{
            EnrollStatus, Enrollment, Lesson, LessonFiles, NewPilot, Note, NoteFile, Pilot,
            PilotOwner, StoredFile,
        },
        quiz::{
            AttemptSummary, CreateQuizRequest, NewAttempt, Question, QuestionWithOptions,
            QuizBundle, QuizInfo, QuizOption, QuizResult, QuizSettings,
        },
        schedule::{NewSchedule, Schedule, ScheduleStatus},
        user::{NewUser, User},
    },
};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

/// Helper struct for a joined lesson/note row with its optional file.
#[derive(FromRow)]
struct FileJoinRow {
    row_id: i64,
    lesson_id: i64,
    file_id: Option<i64>,
    file_key: Option<String>,
    file_content_type: Option<String>,
    file_created_at: Option<DateTime<Utc>>,
}

impl FileJoinRow {
    fn file(&self) -> Option<StoredFile> {
        match (self.file_id, &self.file_key) {
            (Some(id), Some(key)) => Some(StoredFile {
                id,
                key: key.clone(),
                content_type: self.file_content_type.clone(),
                created_at: self.file_created_at,
            }),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortalStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, password, role, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Email '{}' is already registered", user.email))
            } else {
                tracing::error!("Failed to insert user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_pilot(&self, pilot: NewPilot) -> Result<Pilot, AppError> {
        let row = sqlx::query_as::<_, Pilot>(
            r#"
            INSERT INTO pilots (owner_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(pilot.owner_id)
        .bind(&pilot.title)
        .bind(&pilot.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_pilot(&self, id: i64) -> Result<Option<Pilot>, AppError> {
        let pilot = sqlx::query_as::<_, Pilot>("SELECT * FROM pilots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(pilot)
    }

    async fn find_pilot_owner(&self, pilot_id: i64) -> Result<Option<PilotOwner>, AppError> {
        let owner = sqlx::query_as::<_, PilotOwner>(
            r#"
            SELECT
                p.id AS pilot_id,
                p.title AS pilot_title,
                u.id AS owner_id,
                u.name AS owner_name,
                u.email AS owner_email
            FROM pilots p
            JOIN users u ON u.id = p.owner_id
            WHERE p.id = $1
            "#,
        )
        .bind(pilot_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn insert_file(&self, key: &str, content_type: Option<&str>) -> Result<StoredFile, AppError> {
        sqlx::query_as::<_, StoredFile>(
            "INSERT INTO files (key, content_type) VALUES ($1, $2) RETURNING *",
        )
        .bind(key)
        .bind(content_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("File key '{}' already exists", key))
            } else {
                AppError::from(e)
            }
        })
    }

    async fn find_file(&self, id: i64) -> Result<Option<StoredFile>, AppError> {
        let file = sqlx::query_as::<_, StoredFile>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    async fn set_pilot_thumbnail(&self, pilot_id: i64, file_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE pilots SET thumbnail_file_id = $1 WHERE id = $2")
            .bind(file_id)
            .bind(pilot_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Pilot not found".to_string()));
        }
        Ok(())
    }

    async fn insert_lesson(
        &self,
        pilot_id: i64,
        title: &str,
        video_file_id: Option<i64>,
    ) -> Result<Lesson, AppError> {
        let lesson = sqlx::query_as::<_, Lesson>(
            "INSERT INTO lessons (pilot_id, title, video_file_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(pilot_id)
        .bind(title)
        .bind(video_file_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(lesson)
    }

    async fn find_lesson(&self, id: i64) -> Result<Option<Lesson>, AppError> {
        let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lesson)
    }

    async fn insert_note(&self, lesson_id: i64, title: &str, file_id: Option<i64>) -> Result<Note, AppError> {
        let note = sqlx::query_as::<_, Note>(
            "INSERT INTO notes (lesson_id, title, file_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(lesson_id)
        .bind(title)
        .bind(file_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(note)
    }

    async fn record_lesson_progress(&self, lesson_id: i64, user_id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO lesson_progress (lesson_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (lesson_id, user_id) DO NOTHING
            "#,
        )
        .bind(lesson_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn request_enrollment(&self, pilot_id: i64, user_id: i64) -> Result<Enrollment, AppError> {
        // A rejected learner may ask again; pending or approved rows stay as they are.
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enroll_activity (pilot_id, user_id, status)
            VALUES ($1, $2, 'PENDING')
            ON CONFLICT (pilot_id, user_id) DO UPDATE SET
                status = CASE WHEN enroll_activity.status = 'REJECTED'
                    THEN 'PENDING' ELSE enroll_activity.status END
            RETURNING *
            "#,
        )
        .bind(pilot_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrollment)
    }

    async fn find_enrollment(&self, id: i64) -> Result<Option<Enrollment>, AppError> {
        let enrollment = sqlx::query_as::<_, Enrollment>("SELECT * FROM enroll_activity WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(enrollment)
    }

    async fn set_enrollment_status(&self, id: i64, status: EnrollStatus) -> Result<Enrollment, AppError> {
        sqlx::query_as::<_, Enrollment>(
            "UPDATE enroll_activity SET status = $1 WHERE id = $2 RETURNING *",
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))
    }

    async fn enrollment_status(&self, pilot_id: i64, user_id: i64) -> Result<Option<EnrollStatus>, AppError> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM enroll_activity WHERE pilot_id = $1 AND user_id = $2",
        )
        .bind(pilot_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        status
            .map(|s| s.parse::<EnrollStatus>())
            .transpose()
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }

    async fn create_quiz(&self, pilot_id: i64, quiz: &CreateQuizRequest) -> Result<QuizBundle, AppError> {
        let mut tx = self.pool.begin().await?;

        if quiz.set_as_exam {
            sqlx::query("UPDATE quiz_info SET set_as_exam = FALSE WHERE pilot_id = $1")
                .bind(pilot_id)
                .execute(&mut *tx)
                .await?;
        }

        let quiz_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quiz_info (pilot_id, title, summary, set_as_exam)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(pilot_id)
        .bind(&quiz.title)
        .bind(&quiz.summary)
        .bind(quiz.set_as_exam)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO quiz_settings
            (quiz_info_id, time_limit, passing_grade, attempts_allowed, question_order, show_feedback, show_correct_answers)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(quiz_id)
        .bind(quiz.settings.time_limit)
        .bind(quiz.settings.passing_grade)
        .bind(quiz.settings.attempts_allowed)
        .bind(&quiz.settings.question_order)
        .bind(quiz.settings.show_feedback)
        .bind(quiz.settings.show_correct_answers)
        .execute(&mut *tx)
        .await?;

        for (q_pos, question) in quiz.questions.iter().enumerate() {
            let question_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO questions (quiz_info_id, position, text, type, points, answer_required, randomize)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(quiz_id)
            .bind(q_pos as i32)
            .bind(&question.text)
            .bind(question.question_type.as_str())
            .bind(question.points)
            .bind(question.answer_required)
            .bind(question.randomize)
            .fetch_one(&mut *tx)
            .await?;

            for (o_pos, option) in question.options.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO options (question_id, position, text, is_correct) VALUES ($1, $2, $3, $4)",
                )
                .bind(question_id)
                .bind(o_pos as i32)
                .bind(&option.text)
                .bind(option.is_correct)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.load_quiz(quiz_id)
            .await?
            .ok_or(AppError::InternalServerError("Quiz vanished after insert".to_string()))
    }

    async fn load_quiz(&self, quiz_info_id: i64) -> Result<Option<QuizBundle>, AppError> {
        let Some(info) = sqlx::query_as::<_, QuizInfo>("SELECT * FROM quiz_info WHERE id = $1")
            .bind(quiz_info_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let settings =
            sqlx::query_as::<_, QuizSettings>("SELECT * FROM quiz_settings WHERE quiz_info_id = $1")
                .bind(quiz_info_id)
                .fetch_optional(&self.pool)
                .await?;

        let questions = sqlx::query_as::<_, Question>(
            "SELECT * FROM questions WHERE quiz_info_id = $1 ORDER BY position, id",
        )
        .bind(quiz_info_id)
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<_, QuizOption>(
            r#"
            SELECT o.*
            FROM options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.quiz_info_id = $1
            ORDER BY o.position, o.id
            "#,
        )
        .bind(quiz_info_id)
        .fetch_all(&self.pool)
        .await?;

        let questions = questions
            .into_iter()
            .map(|question| {
                let options = options
                    .iter()
                    .filter(|o| o.question_id == question.id)
                    .cloned()
                    .collect();
                QuestionWithOptions { question, options }
            })
            .collect();

        Ok(Some(QuizBundle {
            info,
            settings,
            questions,
        }))
    }

    async fn latest_attempt(&self, user_id: i64, quiz_info_id: i64) -> Result<Option<AttemptSummary>, AppError> {
        let summary = sqlx::query_as::<_, AttemptSummary>(
            r#"
            SELECT
                a.id AS attempt_id,
                a.quiz_info_id,
                r.score,
                r.passed,
                r.feedback,
                a.created_at
            FROM quiz_attempts a
            JOIN quiz_results r ON r.attempt_id = a.id
            WHERE a.user_id = $1 AND a.quiz_info_id = $2
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(quiz_info_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn has_passed_pilot_quiz(&self, pilot_id: i64, user_id: i64) -> Result<bool, AppError> {
        let passed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM quiz_attempts a
                JOIN quiz_results r ON r.attempt_id = a.id
                JOIN quiz_info q ON q.id = a.quiz_info_id
                WHERE q.pilot_id = $1 AND a.user_id = $2 AND r.passed
            )
            "#,
        )
        .bind(pilot_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(passed)
    }

    async fn find_pending_schedule(&self, pilot_id: i64, user_id: i64) -> Result<Option<Schedule>, AppError> {
        let schedule = sqlx::query_as::<_, Schedule>(
            "SELECT * FROM schedules WHERE pilot_id = $1 AND user_id = $2 AND status = 'PENDING'",
        )
        .bind(pilot_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(schedule)
    }

    async fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, AppError> {
        let inserted = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (pilot_id, user_id, owner_id, scheduled_date_time, status, message)
            VALUES ($1, $2, $3, $4, 'PENDING', $5)
            RETURNING *
            "#,
        )
        .bind(schedule.pilot_id)
        .bind(schedule.user_id)
        .bind(schedule.owner_id)
        .bind(schedule.scheduled_date_time)
        .bind(&schedule.message)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row),
            // Lost the race against a concurrent request; report the winner's time.
            Err(e) if is_unique_violation(&e) => {
                match self
                    .find_pending_schedule(schedule.pilot_id, schedule.user_id)
                    .await?
                {
                    Some(existing) => Err(AppError::PendingScheduleExists(existing.scheduled_date_time)),
                    None => Err(AppError::from(e)),
                }
            }
            Err(e) => Err(AppError::from(e)),
        }
    }

    async fn find_schedule(&self, id: i64) -> Result<Option<Schedule>, AppError> {
        let schedule = sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(schedule)
    }

    async fn transition_schedule(
        &self,
        id: i64,
        to: ScheduleStatus,
        final_message: Option<&str>,
    ) -> Result<Option<Schedule>, AppError> {
        let schedule = sqlx::query_as::<_, Schedule>(
            r#"
            UPDATE schedules
            SET status = $1, final_message = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(to.as_str())
        .bind(final_message)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(schedule)
    }

    async fn list_schedules_for_user(&self, user_id: i64) -> Result<Vec<Schedule>, AppError> {
        let rows = sqlx::query_as::<_, Schedule>(
            "SELECT * FROM schedules WHERE user_id = $1 ORDER BY scheduled_date_time DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_schedules_for_owner(&self, owner_id: i64) -> Result<Vec<Schedule>, AppError> {
        let rows = sqlx::query_as::<_, Schedule>(
            "SELECT * FROM schedules WHERE owner_id = $1 ORDER BY scheduled_date_time DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn count_attempts(&mut self, user_id: i64, quiz_info_id: i64) -> Result<i64, AppError> {
        // Row lock on the user: concurrent submissions queue here until commit.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_info_id = $2",
        )
        .bind(user_id)
        .bind(quiz_info_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn insert_attempt(&mut self, attempt: &NewAttempt) -> Result<QuizResult, AppError> {
        let attempt_id: i64 = sqlx::query_scalar(
            "INSERT INTO quiz_attempts (user_id, quiz_info_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(attempt.user_id)
        .bind(attempt.quiz_info_id)
        .fetch_one(&mut *self.tx)
        .await?;

        for answer in &attempt.answers {
            sqlx::query(
                "INSERT INTO user_answers (attempt_id, question_id, selected_option_ids) VALUES ($1, $2, $3)",
            )
            .bind(attempt_id)
            .bind(answer.question_id)
            .bind(&answer.selected_option_ids)
            .execute(&mut *self.tx)
            .await?;
        }

        let result = sqlx::query_as::<_, QuizResult>(
            r#"
            INSERT INTO quiz_results (attempt_id, score, passed, feedback)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(attempt.score)
        .bind(attempt.passed)
        .bind(&attempt.feedback)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(result)
    }

    async fn set_timeout(&mut self, seconds: u64) -> Result<(), AppError> {
        // SET does not take bind parameters; the value is an integer.
        sqlx::query(&format!("SET LOCAL statement_timeout = '{}s'", seconds))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn quiz_ids_for_pilot(&mut self, pilot_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM quiz_info WHERE pilot_id = $1")
            .bind(pilot_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(ids)
    }

    async fn attempt_ids_for_quiz(&mut self, quiz_info_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM quiz_attempts WHERE quiz_info_id = $1")
            .bind(quiz_info_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(ids)
    }

    async fn delete_user_answers(&mut self, attempt_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM user_answers WHERE attempt_id = $1")
            .bind(attempt_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_quiz_result(&mut self, attempt_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM quiz_results WHERE attempt_id = $1")
            .bind(attempt_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_attempts(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM quiz_attempts WHERE quiz_info_id = $1")
            .bind(quiz_info_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_options(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM options WHERE question_id IN (SELECT id FROM questions WHERE quiz_info_id = $1)",
        )
        .bind(quiz_info_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_questions(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE quiz_info_id = $1")
            .bind(quiz_info_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_quiz_settings(&mut self, quiz_info_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM quiz_settings WHERE quiz_info_id = $1")
            .bind(quiz_info_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_quizzes(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM quiz_info WHERE pilot_id = $1")
            .bind(pilot_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_enrollments(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM enroll_activity WHERE pilot_id = $1")
            .bind(pilot_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_schedules(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM schedules WHERE pilot_id = $1")
            .bind(pilot_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lessons_for_pilot(&mut self, pilot_id: i64) -> Result<Vec<LessonFiles>, AppError> {
        let lessons = sqlx::query_as::<_, FileJoinRow>(
            r#"
            SELECT
                l.id AS row_id,
                l.id AS lesson_id,
                f.id AS file_id,
                f.key AS file_key,
                f.content_type AS file_content_type,
                f.created_at AS file_created_at
            FROM lessons l
            LEFT JOIN files f ON f.id = l.video_file_id
            WHERE l.pilot_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(pilot_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let notes = sqlx::query_as::<_, FileJoinRow>(
            r#"
            SELECT
                n.id AS row_id,
                n.lesson_id,
                f.id AS file_id,
                f.key AS file_key,
                f.content_type AS file_content_type,
                f.created_at AS file_created_at
            FROM notes n
            JOIN lessons l ON l.id = n.lesson_id
            LEFT JOIN files f ON f.id = n.file_id
            WHERE l.pilot_id = $1
            ORDER BY n.id
            "#,
        )
        .bind(pilot_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(lessons
            .iter()
            .map(|lesson| LessonFiles {
                lesson_id: lesson.lesson_id,
                video: lesson.file(),
                notes: notes
                    .iter()
                    .filter(|n| n.lesson_id == lesson.lesson_id)
                    .map(|n| NoteFile {
                        note_id: n.row_id,
                        file: n.file(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn delete_lesson_progress(&mut self, lesson_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM lesson_progress WHERE lesson_id = $1")
            .bind(lesson_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_note(&mut self, note_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(note_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_lesson(&mut self, lesson_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(lesson_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_file(&mut self, file_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(file_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn pilot_thumbnail(&mut self, pilot_id: i64) -> Result<Option<StoredFile>, AppError> {
        let file = sqlx::query_as::<_, StoredFile>(
            r#"
            SELECT f.*
            FROM pilots p
            JOIN files f ON f.id = p.thumbnail_file_id
            WHERE p.id = $1
            "#,
        )
        .bind(pilot_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(file)
    }

    async fn delete_pilot(&mut self, pilot_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM pilots WHERE id = $1")
            .bind(pilot_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
