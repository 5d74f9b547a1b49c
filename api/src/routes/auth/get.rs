use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use db::models::user;
use sea_orm::EntityTrait;

use super::common::AuthUserPayload;
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /auth/me
///
/// Returns the authenticated principal, loaded fresh from the database.
///
/// ### Responses
///
/// - `200 OK`
/// ```json
/// {
///   "success": true,
///   "data": {
///     "id": 1,
///     "email": "ana@example.com",
///     "full_name": "Ana Torres",
///     "role": "student",
///     "roles": ["student"],
///     "is_active": true
///   },
///   "message": "User retrieved successfully"
/// }
/// ```
///
/// - `401 Unauthorized` (missing/invalid access token)
/// - `404 Not Found` (token subject no longer exists)
pub async fn get_me(
    State(app_state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> impl IntoResponse {
    match user::Entity::find_by_id(claims.sub).one(app_state.db()).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                AuthUserPayload::from_user(&user),
                "User retrieved successfully",
            )),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<AuthUserPayload>::error("User not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "me: user lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<AuthUserPayload>::error(
                    "Failed to retrieve user",
                )),
            )
                .into_response()
        }
    }
}
