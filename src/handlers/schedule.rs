// src/handlers/schedule.rs

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        response::ApiResponse,
        schedule::{CreateScheduleRequest, FinalizeScheduleRequest, ScheduleOutcome},
    },
    services::scheduling,
    state::AppState,
    utils::{
        extract::{ApiJson, ApiPath},
        jwt::Claims,
    },
};

/// The transition is committed either way; the message says whether the email went out.
fn outcome_message(done: &str, outcome: &ScheduleOutcome) -> String {
    if outcome.notification_sent {
        format!("{} and notification sent", done)
    } else {
        format!("{}, but the notification email could not be sent", done)
    }
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<CreateScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = scheduling::create_schedule(
        state.store.as_ref(),
        &state.notifier,
        claims.user_id()?,
        &payload,
        Utc::now(),
    )
    .await?;

    let message = outcome_message("Schedule requested", &outcome);
    Ok((StatusCode::CREATED, ApiResponse::ok(message, outcome)))
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let list = scheduling::list_schedules(state.store.as_ref(), claims.user_id()?).await?;
    Ok(ApiResponse::ok("Schedules loaded", list))
}

pub async fn accept_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(schedule_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = scheduling::accept_schedule(
        state.store.as_ref(),
        &state.notifier,
        schedule_id,
        claims.user_id()?,
    )
    .await?;

    let message = outcome_message("Schedule accepted", &outcome);
    Ok(ApiResponse::ok(message, outcome))
}

pub async fn finalize_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(schedule_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<FinalizeScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = scheduling::finalize_schedule_via_email(
        state.store.as_ref(),
        &state.notifier,
        schedule_id,
        claims.user_id()?,
        &payload.message,
    )
    .await?;

    let message = outcome_message("Schedule finalized via email", &outcome);
    Ok(ApiResponse::ok(message, outcome))
}
