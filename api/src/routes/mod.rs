//! HTTP route entry point for `/api/...`.
//!
//! Routes are organized by domain, each group protected by the appropriate
//! role guard:
//! - `/health` → liveness probe (public)
//! - `/auth` → registration, login, token refresh, current principal (public)
//! - `/student` → course catalog, tutoring sessions, grades (students)
//! - `/teacher` → authoring, submission review, risk analytics (teachers)
//! - `/learning` → document upload and exercise generation (teachers)

use axum::{Router, middleware::from_fn};

use crate::auth::guards::{allow_student, allow_teacher};
use crate::state::AppState;

pub mod auth;
pub mod health;
pub mod learning;
pub mod student;
pub mod teacher;

/// Builds the complete application router for all HTTP endpoints.
///
/// The returned router is fully stateful: callers nest it under `/api` and
/// serve it as-is.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health::health_routes())
        .nest("/auth", auth::auth_routes())
        .nest(
            "/student",
            student::student_routes().route_layer(from_fn(allow_student)),
        )
        .nest(
            "/teacher",
            teacher::teacher_routes().route_layer(from_fn(allow_teacher)),
        )
        .nest(
            "/learning",
            learning::learning_routes().route_layer(from_fn(allow_teacher)),
        )
        .with_state(app_state)
}
