//! # sessions Routes Module
//!
//! Tutoring session lifecycle under `/student/sessions`: start, chat,
//! submit, read back.

pub mod common;
pub mod get;
pub mod post;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;
use get::get_session;
use post::{chat, start_session, submit};

/// Builds the `/student/sessions` route group.
///
/// - `POST /student/sessions` → `start_session`
/// - `GET /student/sessions/{session_id}` → `get_session`
/// - `POST /student/sessions/{session_id}/chat` → `chat`
/// - `POST /student/sessions/{session_id}/submit` → `submit`
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/{session_id}", get(get_session))
        .route("/{session_id}/chat", post(chat))
        .route("/{session_id}/submit", post(submit))
}
