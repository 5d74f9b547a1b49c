use std::str::FromStr;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use db::models::activity::{self, ActivityStatus};
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};

use super::common::owned_activity;
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: i64,
    pub status: String,
}

/// PATCH /teacher/activities/{activity_id}/status
///
/// Moves an activity between `draft`, `published` and `archived`.
///
/// ### Request Body
/// ```json
/// { "status": "archived" }
/// ```
///
/// ### Error Responses
/// - `400 Bad Request`: unknown status value.
/// - `404 Not Found`: activity missing or owned by another teacher.
pub async fn update_activity_status(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    let status = match ActivityStatus::from_str(&req.status) {
        Ok(status) => status,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(
                    "Status must be one of draft, published, archived",
                )),
            )
                .into_response();
        }
    };

    let db = app_state.db();

    let activity = match owned_activity(db, activity_id, user.0.sub).await {
        Ok(Some((activity, _))) => activity,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "update status: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to update status")),
            )
                .into_response();
        }
    };

    let mut active: activity::ActiveModel = activity.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());

    match active.update(db).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                StatusResponse {
                    id: updated.id,
                    status: updated.status.to_string(),
                },
                "Activity status updated successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "update status: update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to update status")),
            )
                .into_response()
        }
    }
}
