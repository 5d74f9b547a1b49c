use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::response::ApiResponse;
use crate::state::AppState;

/// Builds the `/health` route group.
///
/// A single `GET /health` endpoint for uptime checks and deployment health
/// monitoring.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Serialize, Default)]
struct HealthPayload {
    status: String,
    version: String,
}

/// GET /health
///
/// Returns a simple success response to indicate the API is running.
///
/// ### Response
/// - `200 OK`
///
/// ```json
/// {
///   "success": true,
///   "data": { "status": "ok", "version": "0.1.0" },
///   "message": "Health check passed"
/// }
/// ```
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success(
        HealthPayload {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        "Health check passed",
    ))
}
