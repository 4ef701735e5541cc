// src/error.rs

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Every expected failure of a workflow is one of these; they are detected
/// before any mutation and rendered as a `{success: false, message, data}` body.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (malformed input, failed precondition on input data)
    BadRequest(String),

    // 401 Unauthorized (no or invalid credentials)
    AuthError(String),

    // 403 Forbidden (caller is not the owner of the resource)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate email)
    Conflict(String),

    // 409 Conflict, a PENDING schedule already exists for this pilot and learner
    PendingScheduleExists(DateTime<Utc>),

    // 409 Conflict, state machine precondition violated
    InvalidState(String),

    // 502 Bad Gateway, object storage or email collaborator failed
    DependencyFailure(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::PendingScheduleExists(_)
            | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::DependencyFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg) => write!(f, "internal error: {}", msg),
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidState(msg)
            | AppError::DependencyFailure(msg) => f.write_str(msg),
            AppError::PendingScheduleExists(at) => write!(
                f,
                "You already have a pending schedule request for {}",
                at.to_rfc3339()
            ),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts the error into the uniform JSON envelope with the matching status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let data = match &self {
            AppError::PendingScheduleExists(at) => json!({ "scheduled_date_time": at }),
            _ => serde_json::Value::Null,
        };
        let message = match &self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Something went wrong. Please try again later.".to_string()
            }
            AppError::DependencyFailure(msg) => {
                tracing::error!("Dependency failure: {}", msg);
                msg.clone()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "data": data,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError`.
/// Unique violations (SQLSTATE 23505) become `Conflict`, everything else is internal.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unique constraint");
                return AppError::Conflict(format!("Duplicate record violates {}", constraint));
            }
        }
        AppError::InternalServerError(err.to_string())
    }
}

/// Malformed request bodies keep axum's description but use the error envelope.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidState("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::DependencyFailure("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_pending_schedule_message_names_the_time() {
        let at = DateTime::parse_from_rfc3339("2030-01-02T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let msg = AppError::PendingScheduleExists(at).to_string();
        assert!(msg.contains("2030-01-02T10:00:00"));
    }
}
