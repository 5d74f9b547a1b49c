use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use db::models::chat_message::Model as ChatMessage;
use serde::Serialize;

use super::common::owned_session;
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ChatTurnItem {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    pub id: i64,
    pub activity_id: i64,
    pub mode: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatTurnItem>,
}

/// GET /student/sessions/{session_id}
///
/// One session with its full chat history in send order.
///
/// ### Error Responses
/// - `404 Not Found`: unknown session or one owned by another student.
pub async fn get_session(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<i64>,
) -> impl IntoResponse {
    let db = app_state.db();

    let session = match owned_session(db, session_id, user.0.sub).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Session not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "session detail: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve session")),
            )
                .into_response();
        }
    };

    match ChatMessage::history(db, session.id).await {
        Ok(messages) => {
            let response = SessionDetailResponse {
                id: session.id,
                activity_id: session.activity_id,
                mode: session.mode.to_string(),
                status: session.status.to_string(),
                created_at: session.created_at,
                messages: messages
                    .into_iter()
                    .map(|m| ChatTurnItem {
                        role: m.role.to_string(),
                        content: m.content,
                        timestamp: m.created_at,
                    })
                    .collect(),
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    response,
                    "Session retrieved successfully",
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "session detail: history query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve session")),
            )
                .into_response()
        }
    }
}
