use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::format_validation_errors;
use db::models::{
    activity::{self, ActivityStatus},
    activity_document::{self, Column as DocumentCol},
    exercise::{self, Column as ExerciseCol},
    generation_job::{self, JobStatus},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::{is_pdf, owned_job};
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::teacher::common::owned_activity;
use crate::state::AppState;
use crate::tasks::{
    TaskKey,
    generation::{GenerationParams, spawn_generation},
};

#[derive(Debug, Serialize)]
pub struct DocumentUploadResponse {
    pub id: i64,
    pub filename: String,
    pub text_length: usize,
}

/// POST /learning/activities/{activity_id}/document
///
/// Accepts one PDF under the multipart field `file`, extracts its text and
/// stores both for later generation and tutoring context.
///
/// ### Error Responses
/// - `400 Bad Request`: missing file, non-PDF upload, or unreadable PDF.
/// - `404 Not Found`: activity missing or owned by another teacher.
pub async fn upload_document(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let db = app_state.db();

    match owned_activity(db, activity_id, user.0.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "upload document: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to store document")),
            )
                .into_response();
        }
    }

    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name().unwrap_or("") == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            if let Ok(bytes) = field.bytes().await {
                file_bytes = Some(bytes.to_vec());
            }
        }
    }

    let (filename, bytes) = match (file_name, file_bytes) {
        (Some(name), Some(bytes)) if !bytes.is_empty() => (name, bytes),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error("No file provided")),
            )
                .into_response();
        }
    };

    if !is_pdf(&filename, &bytes) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error("Only PDF documents are accepted")),
        )
            .into_response();
    }

    let content_text = match pdf_extract::extract_text_from_mem(&bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "upload document: text extraction failed");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(
                    "Could not extract text from the PDF document",
                )),
            )
                .into_response();
        }
    };

    match activity_document::Model::save_document(db, activity_id, &filename, &bytes, &content_text)
        .await
    {
        Ok(document) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                DocumentUploadResponse {
                    id: document.id,
                    filename: document.filename,
                    text_length: content_text.chars().count(),
                },
                "Document uploaded successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "upload document: save failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to store document")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    pub activity_id: i64,
    #[validate(length(min = 1, message = "Topic must not be empty"))]
    pub topic: String,
    #[validate(length(min = 1, message = "Difficulty must not be empty"))]
    pub difficulty: String,
    #[validate(length(min = 1, message = "Language must not be empty"))]
    pub language: String,
    #[validate(range(min = 1, max = 20, message = "Count must be between 1 and 20"))]
    pub count: u32,
    pub concepts: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct GenerationStartedResponse {
    pub job_id: i64,
    pub status: String,
}

/// POST /learning/generate
///
/// Starts exercise generation for a draft activity and returns immediately
/// with `202 Accepted`; progress is observed by polling the job. The
/// activity must already carry at least one uploaded document.
///
/// ### Request Body
/// ```json
/// {
///   "activity_id": 12,
///   "topic": "Ownership and borrowing",
///   "difficulty": "medium",
///   "language": "rust",
///   "count": 5,
///   "concepts": ["lifetimes", "move semantics"]
/// }
/// ```
///
/// ### Error Responses
/// - `400 Bad Request`: invalid fields, or no document uploaded yet.
/// - `404 Not Found`: activity missing or owned by another teacher.
/// - `409 Conflict`: the activity is not in `draft` status.
pub async fn generate(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<GenerateRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(format_validation_errors(&errors))),
        )
            .into_response();
    }

    let db = app_state.db();

    let activity = match owned_activity(db, req.activity_id, user.0.sub).await {
        Ok(Some((activity, _))) => activity,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "generate: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to start generation")),
            )
                .into_response();
        }
    };

    if activity.status != ActivityStatus::Draft {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error(
                "Exercises can only be generated for draft activities",
            )),
        )
            .into_response();
    }

    match activity_document::Entity::find()
        .filter(DocumentCol::ActivityId.eq(activity.id))
        .count(db)
        .await
    {
        Ok(0) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(
                    "Upload a PDF document for this activity first",
                )),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "generate: document count failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to start generation")),
            )
                .into_response();
        }
    }

    let topic = match req.concepts.as_deref() {
        Some(concepts) if !concepts.is_empty() => {
            format!("{} (focus concepts: {})", req.topic, concepts.join(", "))
        }
        _ => req.topic.clone(),
    };

    let now = Utc::now();
    let model = generation_job::ActiveModel {
        teacher_id: Set(user.0.sub),
        activity_id: Set(activity.id),
        status: Set(JobStatus::Processing),
        topic: Set(topic.clone()),
        difficulty: Set(req.difficulty.clone()),
        language: Set(req.language.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let job = match model.insert(db).await {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(error = %e, "generate: job insert failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to start generation")),
            )
                .into_response();
        }
    };

    let job_id = job.id;
    spawn_generation(
        &app_state,
        job,
        GenerationParams {
            topic,
            difficulty: req.difficulty,
            language: req.language,
            count: req.count,
        },
    );

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            GenerationStartedResponse {
                job_id,
                status: JobStatus::Processing.to_string(),
            },
            "Generation started",
        )),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct PublishJobRequest {
    #[serde(default)]
    pub activity_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishJobResponse {
    pub exercise_count: u64,
    pub status: String,
}

/// POST /learning/jobs/{job_id}/publish
///
/// Approves the drafts: publishes the backing activity (optionally renaming
/// it) and marks the job `completed`. Publishing an already-completed job
/// returns the same exercise count without touching anything.
///
/// ### Error Responses
/// - `404 Not Found`: job missing or owned by another teacher.
/// - `409 Conflict`: job still processing, failed, or cancelled.
pub async fn publish_job(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<i64>,
    body: Option<Json<PublishJobRequest>>,
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
            tracing::error!(error = %e, "publish job: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to publish exercises")),
            )
                .into_response();
        }
    };

    match job.status {
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
                    "Generation failed; there is no draft to publish",
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
        JobStatus::Completed => {
            return match exercise_count(db, job.activity_id).await {
                Ok(count) => (
                    StatusCode::OK,
                    Json(ApiResponse::success(
                        PublishJobResponse {
                            exercise_count: count,
                            status: job.status.to_string(),
                        },
                        "Exercises published successfully",
                    )),
                )
                    .into_response(),
                Err(e) => {
                    tracing::error!(error = %e, "publish job: exercise count failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ApiResponse::<()>::error("Failed to publish exercises")),
                    )
                        .into_response()
                }
            };
        }
        JobStatus::AwaitingApproval => {}
    }

    let activity = match activity::Entity::find_by_id(job.activity_id).one(db).await {
        Ok(Some(activity)) => activity,
        Ok(None) => {
            tracing::error!(job_id, "publish job: draft activity missing");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to publish exercises")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "publish job: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to publish exercises")),
            )
                .into_response();
        }
    };

    let title = body.and_then(|Json(b)| b.activity_title).filter(|t| !t.is_empty());

    let result: Result<u64, sea_orm::DbErr> = async {
        let mut active: activity::ActiveModel = activity.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        active.status = Set(ActivityStatus::Published);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;

        let mut active_job: generation_job::ActiveModel = job.into();
        active_job.status = Set(JobStatus::Completed);
        active_job.updated_at = Set(Utc::now());
        let job = active_job.update(db).await?;

        exercise_count(db, job.activity_id).await
    }
    .await;

    match result {
        Ok(count) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                PublishJobResponse {
                    exercise_count: count,
                    status: JobStatus::Completed.to_string(),
                },
                "Exercises published successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "publish job: update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to publish exercises")),
            )
                .into_response()
        }
    }
}

async fn exercise_count(
    db: &sea_orm::DatabaseConnection,
    activity_id: i64,
) -> Result<u64, sea_orm::DbErr> {
    exercise::Entity::find()
        .filter(ExerciseCol::ActivityId.eq(activity_id))
        .count(db)
        .await
}

#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: i64,
    pub status: String,
}

/// POST /learning/jobs/{job_id}/cancel
///
/// Abandons a job: aborts a still-running worker and marks the job
/// `cancelled`. Draft exercises already written stay behind on the draft
/// activity.
///
/// ### Error Responses
/// - `404 Not Found`: job missing or owned by another teacher.
/// - `409 Conflict`: the job already reached a terminal state.
pub async fn cancel_job(
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
            tracing::error!(error = %e, "cancel job: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to cancel job")),
            )
                .into_response();
        }
    };

    if job.status.is_terminal() {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error("Job already finished")),
        )
            .into_response();
    }

    app_state.tasks().abort(TaskKey::Generation(job.id));

    let job_id = job.id;
    let mut active: generation_job::ActiveModel = job.into();
    active.status = Set(JobStatus::Cancelled);
    active.updated_at = Set(Utc::now());

    match active.update(db).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                CancelJobResponse {
                    job_id: updated.id,
                    status: updated.status.to_string(),
                },
                "Generation job cancelled",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, job_id, "cancel job: update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to cancel job")),
            )
                .into_response()
        }
    }
}
