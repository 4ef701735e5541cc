// src/handlers/quiz.rs

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::pilot::managed_pilot,
    models::{
        pilot::EnrollStatus,
        quiz::{CreateQuizRequest, PublicQuiz, SubmitAttemptRequest},
        response::ApiResponse,
    },
    services::attempts,
    state::AppState,
    utils::{
        extract::{ApiJson, ApiPath},
        jwt::Claims,
    },
};

/// Creates a quiz with its settings, questions and options.
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(pilot_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    for question in &payload.questions {
        question.check_options().map_err(AppError::BadRequest)?;
    }

    let pilot = managed_pilot(&state, pilot_id, &claims).await?;
    let bundle = state.store.create_quiz(pilot.id, &payload).await?;

    tracing::info!(
        quiz_info_id = bundle.info.id,
        pilot_id,
        questions = bundle.questions.len(),
        exam = bundle.info.set_as_exam,
        "quiz created"
    );

    Ok((StatusCode::CREATED, ApiResponse::ok("Quiz created", bundle)))
}

/// Returns the quiz without correctness flags.
///
/// Learners need an APPROVED enrollment; the owner always sees it.
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(quiz_info_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let bundle = state
        .store
        .load_quiz(quiz_info_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    ensure_participant(&state, bundle.info.pilot_id, &claims).await?;

    Ok(ApiResponse::ok("Quiz loaded", PublicQuiz::from(bundle)))
}

/// Grades and stores a new attempt.
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(quiz_info_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bundle = state
        .store
        .load_quiz(quiz_info_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
    ensure_participant(&state, bundle.info.pilot_id, &claims).await?;

    let outcome = attempts::create_attempt(
        state.store.as_ref(),
        quiz_info_id,
        claims.user_id()?,
        &payload.answers,
    )
    .await?;

    let message = if outcome.passed { "Quiz passed" } else { "Quiz not passed" };
    Ok((StatusCode::CREATED, ApiResponse::ok(message, outcome)))
}

pub async fn latest_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(quiz_info_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = attempts::check_attempt(state.store.as_ref(), claims.user_id()?, quiz_info_id).await?;

    Ok(match summary {
        Some(summary) => ApiResponse::ok("Latest attempt", json!(summary)),
        None => ApiResponse::ok("No attempt yet", json!(null)),
    })
}

async fn ensure_participant(state: &AppState, pilot_id: i64, claims: &Claims) -> Result<(), AppError> {
    if managed_pilot(state, pilot_id, claims).await.is_ok() {
        return Ok(());
    }
    let status = state.store.enrollment_status(pilot_id, claims.user_id()?).await?;
    if status != Some(EnrollStatus::Approved) {
        return Err(AppError::Forbidden(
            "You must be enrolled in this pilot to take its quizzes".to_string(),
        ));
    }
    Ok(())
}
