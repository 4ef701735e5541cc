// src/models/pilot.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::ParseEnumError;

/// Represents the 'pilots' table: a course offered by a pilot owner.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Pilot {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_file_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A pilot joined with its owner's contact data.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PilotOwner {
    pub pilot_id: i64,
    pub pilot_title: String,
    pub owner_id: i64,
    pub owner_name: String,
    pub owner_email: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub pilot_id: i64,
    pub title: String,
    /// Tutorial video stored in object storage.
    pub video_file_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub file_id: Option<i64>,
}

/// Represents the 'files' table: a pointer to an object storage key.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: i64,
    pub key: String,
    pub content_type: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lesson plus the files hanging off it, as seen by the deletion orchestrator.
#[derive(Debug, Clone)]
pub struct LessonFiles {
    pub lesson_id: i64,
    pub video: Option<StoredFile>,
    pub notes: Vec<NoteFile>,
}

#[derive(Debug, Clone)]
pub struct NoteFile {
    pub note_id: i64,
    pub file: Option<StoredFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollStatus {
    Pending,
    Approved,
    Rejected,
}

impl EnrollStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollStatus::Pending => "PENDING",
            EnrollStatus::Approved => "APPROVED",
            EnrollStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for EnrollStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EnrollStatus::Pending),
            "APPROVED" => Ok(EnrollStatus::Approved),
            "REJECTED" => Ok(EnrollStatus::Rejected),
            other => Err(ParseEnumError {
                kind: "enrollment status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EnrollStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'enroll_activity' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub pilot_id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub status: EnrollStatus,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Row counts removed by a pilot deletion, plus storage keys that could not be removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionReport {
    pub pilot_id: i64,
    pub quizzes: u64,
    pub questions: u64,
    pub options: u64,
    pub attempts: u64,
    pub user_answers: u64,
    pub results: u64,
    pub quiz_settings: u64,
    pub enrollments: u64,
    pub schedules: u64,
    pub lessons: u64,
    pub lesson_progress: u64,
    pub notes: u64,
    pub files: u64,
    pub orphaned_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePilotRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPilot {
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
}

/// DTO for creating a lesson. `video_key` must already exist in object storage.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub video_key: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub file_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewEnrollmentRequest {
    pub status: EnrollStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_status_round_trips_through_text() {
        for status in [EnrollStatus::Pending, EnrollStatus::Approved, EnrollStatus::Rejected] {
            assert_eq!(status.as_str().parse::<EnrollStatus>().unwrap(), status);
        }
        assert!("approved".parse::<EnrollStatus>().is_err());
    }
}
