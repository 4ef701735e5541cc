// src/routes.rs

use std::any::Any;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, enrollment, pilot, quiz, schedule},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Converts a handler panic into the generic failure envelope.
fn panic_response(_err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "message": "Something went wrong. Please try again later.",
            "data": null,
        })),
    )
        .into_response()
}

/// Assembles the main application router.
///
/// * Auth routes are public, everything else requires a bearer token.
/// * Applies global middleware (Trace, CORS, panic recovery).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let pilot_routes = Router::new()
        .route("/", post(pilot::create_pilot))
        .route("/{id}", delete(pilot::delete_pilot))
        .route("/{id}/thumbnail", put(pilot::upload_thumbnail))
        .route("/{id}/lessons", post(pilot::create_lesson))
        .route("/{id}/enroll", post(enrollment::request_enrollment))
        .route("/{id}/quizzes", post(quiz::create_quiz));

    let lesson_routes = Router::new()
        .route("/{id}/notes", post(pilot::create_note))
        .route("/{id}/video", get(pilot::lesson_video_url))
        .route("/{id}/progress", post(pilot::record_progress));

    let quiz_routes = Router::new()
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/attempts", post(quiz::submit_attempt))
        .route("/{id}/attempts/latest", get(quiz::latest_attempt));

    let schedule_routes = Router::new()
        .route("/", post(schedule::create_schedule).get(schedule::list_schedules))
        .route("/{id}/accept", post(schedule::accept_schedule))
        .route("/{id}/finalize", post(schedule::finalize_schedule));

    let protected = Router::new()
        .nest("/pilots", pilot_routes)
        .route("/enrollments/{id}", put(enrollment::review_enrollment))
        .nest("/lessons", lesson_routes)
        .nest("/quizzes", quiz_routes)
        .nest("/schedules", schedule_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", protected)
        // Last added runs first: CORS, then tracing, then panic recovery.
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
