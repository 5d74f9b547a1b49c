//! AI generation routes: document upload, exercise generation jobs and the
//! approve/cancel lifecycle around them.
//!
//! Jobs run on background tasks; these routes only start, observe and
//! resolve them. The whole group sits behind the teacher guard.

pub mod common;
pub mod get;
pub mod post;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;
use get::{get_job_draft, get_job_status};
use post::{cancel_job, generate, publish_job, upload_document};

/// Uploaded lecture PDFs can be large; JSON bodies in this group never are.
const MAX_UPLOAD_SIZE: usize = 20 * 1024 * 1024;

/// Builds the `/learning` route group.
pub fn learning_routes() -> Router<AppState> {
    Router::new()
        .route("/activities/{activity_id}/document", post(upload_document))
        .route("/generate", post(generate))
        .route("/jobs/{job_id}", get(get_job_status))
        .route("/jobs/{job_id}/draft", get(get_job_draft))
        .route("/jobs/{job_id}/publish", post(publish_job))
        .route("/jobs/{job_id}/cancel", post(cancel_job))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
}
