// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        response::ApiResponse,
        user::{LoginRequest, NewUser, ROLE_LEARNER, ROLE_OWNER, RegisterRequest},
    },
    state::AppState,
    utils::{
        extract::ApiJson,
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new learner or pilot owner.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let role = match payload.role.as_deref() {
        None | Some(ROLE_LEARNER) => ROLE_LEARNER,
        Some(ROLE_OWNER) => ROLE_OWNER,
        Some(other) => {
            return Err(AppError::BadRequest(format!("Unknown role '{}'", other)));
        }
    };

    let email = payload.email.trim().to_lowercase();
    let hashed_password = hash_password(&payload.password)?;

    let user = state
        .store
        .insert_user(NewUser {
            email: email.clone(),
            name: payload.name.trim().to_string(),
            password: hashed_password,
            role: role.to_string(),
        })
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict(format!("Email '{}' is already registered", email)),
            other => other,
        })?;

    tracing::info!(user_id = user.id, role, "user registered");

    Ok((StatusCode::CREATED, ApiResponse::ok("Registered", user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = state
        .store
        .find_user_by_email(&payload.email.trim().to_lowercase())
        .await?
        .ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let token = sign_jwt(&user, &state.config.jwt_secret, state.config.jwt_expiration)?;

    Ok(ApiResponse::ok(
        "Logged in",
        json!({
            "token": token,
            "type": "Bearer",
            "user": user,
        }),
    ))
}
