// src/handlers/enrollment.rs

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    handlers::pilot::managed_pilot,
    models::{
        pilot::{EnrollStatus, ReviewEnrollmentRequest},
        response::ApiResponse,
    },
    state::AppState,
    utils::{
        extract::{ApiJson, ApiPath},
        jwt::Claims,
    },
};

/// Asks to join a pilot. Repeating the request returns the existing row;
/// a rejected request goes back to PENDING.
pub async fn request_enrollment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(pilot_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let pilot = state
        .store
        .find_pilot(pilot_id)
        .await?
        .ok_or(AppError::NotFound("Pilot not found".to_string()))?;

    if pilot.owner_id == user_id {
        return Err(AppError::BadRequest("You cannot enroll in your own pilot".to_string()));
    }

    let enrollment = state.store.request_enrollment(pilot.id, user_id).await?;
    tracing::info!(
        enrollment_id = enrollment.id,
        pilot_id,
        user_id,
        status = enrollment.status.as_str(),
        "enrollment requested"
    );

    Ok((StatusCode::CREATED, ApiResponse::ok("Enrollment requested", enrollment)))
}

/// Owner approves or rejects an enrollment request.
pub async fn review_enrollment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(enrollment_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ReviewEnrollmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.status == EnrollStatus::Pending {
        return Err(AppError::BadRequest(
            "Status must be APPROVED or REJECTED".to_string(),
        ));
    }

    let enrollment = state
        .store
        .find_enrollment(enrollment_id)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;
    managed_pilot(&state, enrollment.pilot_id, &claims).await?;

    let updated = state
        .store
        .set_enrollment_status(enrollment.id, payload.status)
        .await?;
    tracing::info!(
        enrollment_id,
        status = updated.status.as_str(),
        "enrollment reviewed"
    );

    Ok(ApiResponse::ok("Enrollment updated", updated))
}
