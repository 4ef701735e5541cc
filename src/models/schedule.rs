// src/models/schedule.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::ParseEnumError;

/// Status of a meeting request. ACCEPTED and FINALIZEDVIAEMAIL are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "ACCEPTED")]
    Accepted,
    #[serde(rename = "FINALIZEDVIAEMAIL")]
    FinalizedViaEmail,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "PENDING",
            ScheduleStatus::Accepted => "ACCEPTED",
            ScheduleStatus::FinalizedViaEmail => "FINALIZEDVIAEMAIL",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ScheduleStatus::Pending)
    }

    /// Only PENDING moves, and only into one of the terminal states.
    pub fn can_transition_to(self, next: ScheduleStatus) -> bool {
        self == ScheduleStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScheduleStatus::Pending),
            "ACCEPTED" => Ok(ScheduleStatus::Accepted),
            "FINALIZEDVIAEMAIL" => Ok(ScheduleStatus::FinalizedViaEmail),
            other => Err(ParseEnumError {
                kind: "schedule status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ScheduleStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'schedules' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub pilot_id: i64,
    /// The learner who asked for the meeting.
    pub user_id: i64,
    pub owner_id: i64,
    pub scheduled_date_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: ScheduleStatus,
    pub message: Option<String>,
    pub final_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub pilot_id: i64,
    pub user_id: i64,
    pub owner_id: i64,
    pub scheduled_date_time: DateTime<Utc>,
    pub message: Option<String>,
}

/// DTO for requesting a meeting. The timestamp is RFC 3339.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateScheduleRequest {
    pub pilot_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub scheduled_date_time: String,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FinalizeScheduleRequest {
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

/// Result of a committed transition plus whether the follow-up email went out.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleOutcome {
    pub schedule: Schedule,
    pub notification_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct ScheduleList {
    /// Requests the caller made as a learner.
    pub requested: Vec<Schedule>,
    /// Requests addressed to the caller as pilot owner.
    pub received: Vec<Schedule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_moves_to_terminal_states_only() {
        assert!(ScheduleStatus::Pending.can_transition_to(ScheduleStatus::Accepted));
        assert!(ScheduleStatus::Pending.can_transition_to(ScheduleStatus::FinalizedViaEmail));
        assert!(!ScheduleStatus::Pending.can_transition_to(ScheduleStatus::Pending));
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        for from in [ScheduleStatus::Accepted, ScheduleStatus::FinalizedViaEmail] {
            for to in [
                ScheduleStatus::Pending,
                ScheduleStatus::Accepted,
                ScheduleStatus::FinalizedViaEmail,
            ] {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_status_serializes_as_stored_text() {
        let json = serde_json::to_string(&ScheduleStatus::FinalizedViaEmail).unwrap();
        assert_eq!(json, "\"FINALIZEDVIAEMAIL\"");
        assert_eq!("ACCEPTED".parse::<ScheduleStatus>().unwrap(), ScheduleStatus::Accepted);
    }
}
