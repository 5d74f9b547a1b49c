//! # student Routes Module
//!
//! Student-facing catalog, tutoring sessions and grades under `/student`.
//! Every route here sits behind the student role guard.

pub mod common;
pub mod get;
pub mod sessions;

use axum::{Router, routing::get};

use crate::state::AppState;
use get::{get_activities, get_activity_detail, get_activity_results, get_courses, get_grades};

/// Builds the `/student` route group.
///
/// - `GET /student/courses` → enrolled courses
/// - `GET /student/activities` → published activities in enrolled courses
/// - `GET /student/activities/{activity_id}` → activity detail with exercises
/// - `GET /student/activities/{activity_id}/results` → graded outcome
/// - `GET /student/grades` → all graded activities
/// - `/student/sessions/...` → tutoring session lifecycle
pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(get_courses))
        .route("/activities", get(get_activities))
        .route("/activities/{activity_id}", get(get_activity_detail))
        .route(
            "/activities/{activity_id}/results",
            get(get_activity_results),
        )
        .route("/grades", get(get_grades))
        .nest("/sessions", sessions::session_routes())
}
