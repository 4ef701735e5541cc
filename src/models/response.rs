// src/models/response.rs

use axum::Json;
use serde::Serialize;

/// Uniform envelope returned by every endpoint.
/// Failures use the same shape, see `AppError::into_response`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}
