// src/models/quiz.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::ParseEnumError;

/// Represents the 'quiz_info' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizInfo {
    pub id: i64,
    pub pilot_id: i64,
    pub title: String,
    pub summary: Option<String>,
    /// At most one quiz per pilot carries this flag.
    pub set_as_exam: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'quiz_settings' table, 1:1 with `QuizInfo`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizSettings {
    pub id: i64,
    pub quiz_info_id: i64,
    /// Minutes.
    pub time_limit: i32,
    /// Percent, 0 to 100.
    pub passing_grade: i32,
    /// `None` means unlimited.
    pub attempts_allowed: Option<i32>,
    /// 'fixed' or 'random'.
    pub question_order: String,
    pub show_feedback: bool,
    pub show_correct_answers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Single,
    Multiple,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
            QuestionType::TrueFalse => "true_false",
        }
    }
}

impl FromStr for QuestionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(QuestionType::Single),
            "multiple" => Ok(QuestionType::Multiple),
            "true_false" => Ok(QuestionType::TrueFalse),
            other => Err(ParseEnumError {
                kind: "question type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for QuestionType {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'questions' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_info_id: i64,
    pub position: i32,
    pub text: String,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// 0 to 100.
    pub points: i32,
    pub answer_required: bool,
    pub randomize: bool,
}

/// Represents the 'options' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: i64,
    pub question_id: i64,
    pub position: i32,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<QuizOption>,
}

/// A quiz with everything needed to grade it.
#[derive(Debug, Clone, Serialize)]
pub struct QuizBundle {
    pub info: QuizInfo,
    pub settings: Option<QuizSettings>,
    pub questions: Vec<QuestionWithOptions>,
}

/// Represents the 'quiz_attempts' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_info_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'user_answers' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option_ids: Vec<i64>,
}

/// Represents the 'quiz_results' table, 1:1 with an attempt. Never edited.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: i64,
    pub attempt_id: i64,
    pub score: i32,
    pub passed: bool,
    pub feedback: String,
}

/// Latest attempt joined with its result.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub quiz_info_id: i64,
    pub score: i32,
    pub passed: bool,
    pub feedback: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One graded answer ready to be written.
#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub selected_option_ids: Vec<i64>,
    pub correct: bool,
}

/// Everything `create_attempt` persists in one transaction.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: i64,
    pub quiz_info_id: i64,
    pub answers: Vec<GradedAnswer>,
    pub score: i32,
    pub passed: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: i64,
    #[serde(default)]
    pub selected_option_ids: Vec<i64>,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    pub attempt_id: i64,
    pub score: i32,
    pub passed: bool,
    pub feedback: String,
    pub correct_questions: usize,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionInput {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(range(min = 0, max = 100))]
    pub points: i32,
    #[serde(default = "default_true")]
    pub answer_required: bool,
    #[serde(default)]
    pub randomize: bool,
    #[validate(length(min = 1, max = 20), nested)]
    pub options: Vec<OptionInput>,
}

impl QuestionInput {
    /// Checks the correct-option invariant for the question type.
    pub fn check_options(&self) -> Result<(), String> {
        let correct = self.options.iter().filter(|o| o.is_correct).count();
        match self.question_type {
            QuestionType::Single if correct != 1 => Err(format!(
                "Single choice question '{}' must have exactly one correct option",
                self.text
            )),
            QuestionType::TrueFalse if self.options.len() != 2 || correct != 1 => Err(format!(
                "True/false question '{}' must have two options and exactly one correct",
                self.text
            )),
            QuestionType::Multiple if correct == 0 => Err(format!(
                "Multiple choice question '{}' must have at least one correct option",
                self.text
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuizSettingsInput {
    #[validate(range(min = 1, max = 600))]
    pub time_limit: i32,
    #[validate(range(min = 0, max = 100))]
    pub passing_grade: i32,
    #[validate(range(min = 1))]
    pub attempts_allowed: Option<i32>,
    #[serde(default = "default_question_order")]
    pub question_order: String,
    #[serde(default = "default_true")]
    pub show_feedback: bool,
    #[serde(default)]
    pub show_correct_answers: bool,
}

/// DTO for creating a quiz with its settings and questions in one request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub summary: Option<String>,
    #[serde(default)]
    pub set_as_exam: bool,
    #[validate(nested)]
    pub settings: QuizSettingsInput,
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

fn default_true() -> bool {
    true
}

fn default_question_order() -> String {
    "fixed".to_string()
}

/// DTO for sending an option to a learner (excludes `is_correct`).
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

/// DTO for sending a question to a learner.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub points: i32,
    pub answer_required: bool,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub pilot_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub time_limit: Option<i32>,
    pub passing_grade: Option<i32>,
    pub questions: Vec<PublicQuestion>,
}

impl From<QuizBundle> for PublicQuiz {
    fn from(bundle: QuizBundle) -> Self {
        let questions = bundle
            .questions
            .into_iter()
            .map(|q| PublicQuestion {
                id: q.question.id,
                question_type: q.question.question_type,
                text: q.question.text,
                points: q.question.points,
                answer_required: q.question.answer_required,
                options: q
                    .options
                    .into_iter()
                    .map(|o| PublicOption { id: o.id, text: o.text })
                    .collect(),
            })
            .collect();

        PublicQuiz {
            id: bundle.info.id,
            pilot_id: bundle.info.pilot_id,
            title: bundle.info.title,
            summary: bundle.info.summary,
            time_limit: bundle.settings.as_ref().map(|s| s.time_limit),
            passing_grade: bundle.settings.as_ref().map(|s| s.passing_grade),
            questions,
        }
    }
}
