//! Teacher-facing routes: course and activity authoring, class progress,
//! per-student review and course analytics.
//!
//! Every route in this group sits behind the teacher guard; handlers only
//! ever see resources after an ownership check against the caller.

pub mod common;
pub mod get;
pub mod patch;
pub mod post;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;
use get::{
    get_activities, get_activity, get_activity_exercises, get_activity_students,
    get_course_analytics, get_courses, get_student_details,
};
use patch::update_activity_status;
use post::{analyze_student, create_activity, create_course, enroll_student, publish_activity};

/// Builds the `/teacher` route group.
pub fn teacher_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(get_courses).post(create_course))
        .route("/courses/{course_id}/enroll", post(enroll_student))
        .route("/courses/{course_id}/analytics", get(get_course_analytics))
        .route("/activities", get(get_activities).post(create_activity))
        .route("/activities/{activity_id}", get(get_activity))
        .route(
            "/activities/{activity_id}/status",
            patch(update_activity_status),
        )
        .route(
            "/activities/{activity_id}/publish",
            post(publish_activity),
        )
        .route(
            "/activities/{activity_id}/exercises",
            get(get_activity_exercises),
        )
        .route(
            "/activities/{activity_id}/students",
            get(get_activity_students),
        )
        .route(
            "/activities/{activity_id}/students/{student_id}/details",
            get(get_student_details),
        )
        .route(
            "/activities/{activity_id}/students/{student_id}/analyze",
            post(analyze_student),
        )
}
