// src/handlers/pilot.rs

use axum::{
    Extension,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        pilot::{CreateLessonRequest, CreateNoteRequest, CreatePilotRequest, EnrollStatus, NewPilot, Pilot},
        response::ApiResponse,
    },
    services::pilot_deletion,
    state::AppState,
    utils::{
        extract::{ApiJson, ApiPath},
        jwt::Claims,
        storage::validate_key,
    },
};

/// Loads a pilot the caller may manage: its owner, or an admin.
pub(crate) async fn managed_pilot(state: &AppState, pilot_id: i64, claims: &Claims) -> Result<Pilot, AppError> {
    let pilot = state
        .store
        .find_pilot(pilot_id)
        .await?
        .ok_or(AppError::NotFound("Pilot not found".to_string()))?;

    if pilot.owner_id != claims.user_id()? && !claims.is_admin() {
        return Err(AppError::Forbidden("You do not own this pilot".to_string()));
    }
    Ok(pilot)
}

/// True when the caller manages the pilot or holds an APPROVED enrollment in it.
async fn can_view(state: &AppState, pilot: &Pilot, claims: &Claims) -> Result<bool, AppError> {
    let user_id = claims.user_id()?;
    if pilot.owner_id == user_id || claims.is_admin() {
        return Ok(true);
    }
    let status = state.store.enrollment_status(pilot.id, user_id).await?;
    Ok(status == Some(EnrollStatus::Approved))
}

pub async fn create_pilot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<CreatePilotRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !claims.can_author() {
        return Err(AppError::Forbidden("Only pilot owners can create pilots".to_string()));
    }

    let pilot = state
        .store
        .insert_pilot(NewPilot {
            owner_id: claims.user_id()?,
            title: payload.title.trim().to_string(),
            description: payload.description,
        })
        .await?;

    tracing::info!(pilot_id = pilot.id, owner_id = pilot.owner_id, "pilot created");

    Ok((StatusCode::CREATED, ApiResponse::ok("Pilot created", pilot)))
}

/// Deletes a pilot with all quizzes, enrollments, schedules, lessons and files.
pub async fn delete_pilot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(pilot_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = pilot_deletion::delete_pilot(
        state.store.as_ref(),
        state.storage.as_ref(),
        pilot_id,
        claims.user_id()?,
        claims.is_admin(),
        state.config.pilot_delete_timeout,
    )
    .await?;

    Ok(ApiResponse::ok("Pilot deleted", report))
}

/// Stores the raw request body as the pilot's thumbnail.
///
/// A previous thumbnail is replaced; its object is removed best-effort.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(pilot_id): ApiPath<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let pilot = managed_pilot(&state, pilot_id, &claims).await?;

    if body.is_empty() {
        return Err(AppError::BadRequest("Thumbnail body is empty".to_string()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let key = format!("pilots/{}/thumbnail-{}", pilot.id, Utc::now().timestamp_millis());
    state
        .storage
        .put(&key, body.to_vec(), content_type.as_deref())
        .await?;

    let file = state.store.insert_file(&key, content_type.as_deref()).await?;
    state.store.set_pilot_thumbnail(pilot.id, file.id).await?;

    if let Some(old_id) = pilot.thumbnail_file_id {
        if let Some(old) = state.store.find_file(old_id).await? {
            if let Err(e) = state.storage.delete(&old.key).await {
                tracing::warn!(key = %old.key, error = %e, "old thumbnail left in storage");
            }
            let mut tx = state.store.begin().await?;
            tx.delete_file(old.id).await?;
            tx.commit().await?;
        }
    }

    tracing::info!(pilot_id = pilot.id, key = %key, "thumbnail uploaded");

    Ok(ApiResponse::ok("Thumbnail uploaded", file))
}

pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(pilot_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let pilot = managed_pilot(&state, pilot_id, &claims).await?;

    let video_file_id = match payload.video_key.as_deref() {
        Some(key) => {
            validate_key(key)?;
            Some(state.store.insert_file(key, None).await?.id)
        }
        None => None,
    };

    let lesson = state
        .store
        .insert_lesson(pilot.id, payload.title.trim(), video_file_id)
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok("Lesson created", lesson)))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(lesson_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CreateNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lesson = state
        .store
        .find_lesson(lesson_id)
        .await?
        .ok_or(AppError::NotFound("Lesson not found".to_string()))?;
    managed_pilot(&state, lesson.pilot_id, &claims).await?;

    let file_id = match payload.file_key.as_deref() {
        Some(key) => {
            validate_key(key)?;
            Some(state.store.insert_file(key, None).await?.id)
        }
        None => None,
    };

    let note = state
        .store
        .insert_note(lesson.id, payload.title.trim(), file_id)
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok("Note created", note)))
}

/// Time-limited URL for the lesson's video, for the owner or enrolled learners.
pub async fn lesson_video_url(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(lesson_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let lesson = state
        .store
        .find_lesson(lesson_id)
        .await?
        .ok_or(AppError::NotFound("Lesson not found".to_string()))?;

    let pilot = state
        .store
        .find_pilot(lesson.pilot_id)
        .await?
        .ok_or(AppError::NotFound("Pilot not found".to_string()))?;

    if !can_view(&state, &pilot, &claims).await? {
        return Err(AppError::Forbidden(
            "You must be enrolled in this pilot to watch its lessons".to_string(),
        ));
    }

    let file_id = lesson
        .video_file_id
        .ok_or(AppError::NotFound("Lesson has no video".to_string()))?;
    let file = state
        .store
        .find_file(file_id)
        .await?
        .ok_or(AppError::NotFound("Lesson has no video".to_string()))?;

    let ttl = state.config.presign_ttl;
    let url = state.storage.presigned_url(&file.key, ttl).await?;

    Ok(ApiResponse::ok(
        "Video URL created",
        json!({ "url": url, "expires_in": ttl.as_secs() }),
    ))
}

pub async fn record_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(lesson_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let lesson = state
        .store
        .find_lesson(lesson_id)
        .await?
        .ok_or(AppError::NotFound("Lesson not found".to_string()))?;

    if state.store.enrollment_status(lesson.pilot_id, user_id).await? != Some(EnrollStatus::Approved) {
        return Err(AppError::Forbidden(
            "You must be enrolled in this pilot to record progress".to_string(),
        ));
    }

    state.store.record_lesson_progress(lesson.id, user_id).await?;

    Ok(ApiResponse::ok(
        "Progress recorded",
        json!({ "lesson_id": lesson.id }),
    ))
}
