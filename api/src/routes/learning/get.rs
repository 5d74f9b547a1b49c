use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use db::models::{
    exercise::{self, Column as ExerciseCol},
    generation_job::JobStatus,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use serde_json::Value;

use super::common::owned_job;
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: i64,
    pub activity_id: i64,
    pub status: String,
    pub topic: String,
    pub difficulty: String,
    pub language: String,
    pub exercise_count: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// GET /learning/jobs/{job_id}
///
/// Current state of one generation job, for polling. `exercise_count` is
/// set once drafts are ready; `error_message` once the job failed.
pub async fn get_job_status(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<i64>,
) -> impl IntoResponse {
    match owned_job(app_state.db(), job_id, user.0.sub).await {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                JobStatusResponse {
                    job_id: job.id,
                    activity_id: job.activity_id,
                    status: job.status.to_string(),
                    topic: job.topic,
                    difficulty: job.difficulty,
                    language: job.language,
                    exercise_count: job.exercise_count,
                    error_message: job.error_message,
                    created_at: job.created_at,
                    updated_at: job.updated_at,
                },
                "Job status retrieved successfully",
            )),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error("Job not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "job status: lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve job status")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DraftExercise {
    pub id: i64,
    pub title: String,
    pub problem_statement: String,
    pub starter_code: String,
    pub solution_code: String,
    pub language: String,
    pub difficulty: String,
    pub order_index: i32,
    pub test_cases: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JobDraftResponse {
    pub job_id: i64,
    pub activity_id: i64,
    pub status: String,
    pub exercises: Vec<DraftExercise>,
}

/// GET /learning/jobs/{job_id}/draft
///
/// The generated draft exercises for teacher review, solutions included.
/// Only available once the job reached `awaiting_approval` (and still after
/// publication).
///
/// ### Error Responses
/// - `404 Not Found`: job missing or owned by another teacher.
/// - `409 Conflict`: job still processing, failed, or cancelled.
pub async fn get_job_draft(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<i64>,
) -> impl IntoResponse {
    let db = app_state.db();

    let job = match owned_job(db, job_id, user.0.sub).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Job not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "job draft: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve draft")),
            )
                .into_response();
        }
    };

    match job.status {
        JobStatus::AwaitingApproval | JobStatus::Completed => {}
        JobStatus::Processing => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::<()>::error("Exercises are not ready yet")),
            )
                .into_response();
        }
        JobStatus::Error => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::<()>::error(
                    "Generation failed; there is no draft to review",
                )),
            )
                .into_response();
        }
        JobStatus::Cancelled => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::<()>::error("Job was cancelled")),
            )
                .into_response();
        }
    }

    let exercises = exercise::Entity::find()
        .filter(ExerciseCol::ActivityId.eq(job.activity_id))
        .order_by_asc(ExerciseCol::OrderIndex)
        .all(db)
        .await;

    match exercises {
        Ok(exercises) => {
            let response = JobDraftResponse {
                job_id: job.id,
                activity_id: job.activity_id,
                status: job.status.to_string(),
                exercises: exercises
                    .into_iter()
                    .map(|e| DraftExercise {
                        id: e.id,
                        title: e.title,
                        problem_statement: e.problem_statement,
                        starter_code: e.starter_code,
                        solution_code: e.solution_code,
                        language: e.language,
                        difficulty: e.difficulty,
                        order_index: e.order_index,
                        test_cases: e
                            .test_cases
                            .as_deref()
                            .and_then(|s| serde_json::from_str(s).ok()),
                    })
                    .collect(),
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    response,
                    "Draft retrieved successfully",
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "job draft: exercise query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve draft")),
            )
                .into_response()
        }
    }
}
