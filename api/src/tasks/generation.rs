//! Background worker for one generation job.
//!
//! The worker reads the activity's uploaded document texts, asks the model
//! for draft exercises, stores them under the backing draft activity and
//! advances the job to `awaiting_approval`. Any failure parks the job in
//! `error` with a human-readable message. Transitions are re-checked against
//! the persisted status so a cancellation that raced the worker wins.

use std::sync::Arc;

use ai::{ExerciseGenerator, GenerationRequest};
use chrono::Utc;
use db::models::{
    activity_document::{Column as DocumentCol, Entity as DocumentEntity},
    exercise,
    generation_job::{self, JobStatus},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{error, info};

use crate::state::AppState;
use crate::tasks::TaskKey;

/// Parameters the generate endpoint validated and the worker consumes.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub topic: String,
    pub difficulty: String,
    pub language: String,
    pub count: u32,
}

/// Spawns the worker for `job` unless one is already live. Returns whether a
/// new worker was started.
pub fn spawn_generation(
    state: &AppState,
    job: generation_job::Model,
    params: GenerationParams,
) -> bool {
    let db = state.db_clone();
    let generator = state.ai().generator.clone();
    let key = TaskKey::Generation(job.id);
    state
        .tasks()
        .spawn_guarded(key, run_generation(db, generator, job, params))
}

async fn run_generation(
    db: DatabaseConnection,
    generator: Arc<dyn ExerciseGenerator>,
    job: generation_job::Model,
    params: GenerationParams,
) {
    let outcome = generate_and_store(&db, generator, &job, &params).await;

    let result = match outcome {
        Ok(count) => {
            info!(job_id = job.id, exercises = count, "generation job produced drafts");
            advance_job(&db, job.id, JobStatus::AwaitingApproval, Some(count), None).await
        }
        Err(message) => {
            error!(job_id = job.id, error = %message, "generation job failed");
            advance_job(&db, job.id, JobStatus::Error, None, Some(message)).await
        }
    };

    if let Err(e) = result {
        error!(job_id = job.id, error = %e, "failed to persist generation job outcome");
    }
}

async fn generate_and_store(
    db: &DatabaseConnection,
    generator: Arc<dyn ExerciseGenerator>,
    job: &generation_job::Model,
    params: &GenerationParams,
) -> Result<i32, String> {
    let document_context = document_context(db, job.activity_id)
        .await
        .map_err(|e| format!("could not load activity documents: {e}"))?;

    let drafts = generator
        .generate(GenerationRequest {
            topic: params.topic.clone(),
            difficulty: params.difficulty.clone(),
            language: params.language.clone(),
            count: params.count,
            document_context,
        })
        .await
        .map_err(|e| e.to_string())?;

    let count = drafts.len() as i32;
    for (index, draft) in drafts.into_iter().enumerate() {
        let test_cases = draft
            .test_cases
            .as_ref()
            .and_then(|v| serde_json::to_string(v).ok());
        exercise::ActiveModel {
            activity_id: Set(job.activity_id),
            title: Set(draft.title),
            problem_statement: Set(draft.problem_statement),
            starter_code: Set(draft.starter_code),
            solution_code: Set(draft.solution_code),
            language: Set(params.language.clone()),
            difficulty: Set(params.difficulty.clone()),
            order_index: Set(index as i32),
            test_cases: Set(test_cases),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| format!("could not store draft exercise: {e}"))?;
    }

    Ok(count)
}

/// Concatenated text of the activity's documents, in upload order, in the
/// `Document: {filename}` framing the prompts expect. Empty when the
/// activity has no documents.
pub async fn document_context(
    db: &DatabaseConnection,
    activity_id: i64,
) -> Result<String, DbErr> {
    let documents = DocumentEntity::find()
        .filter(DocumentCol::ActivityId.eq(activity_id))
        .order_by_asc(DocumentCol::Id)
        .all(db)
        .await?;

    Ok(documents
        .iter()
        .map(|d| format!("Document: {}\n{}", d.filename, d.content_text))
        .collect::<Vec<_>>()
        .join("\n\n"))
}

/// Moves the job to `next` if that is still a legal transition from its
/// persisted status. A job cancelled while the worker ran stays cancelled.
async fn advance_job(
    db: &DatabaseConnection,
    job_id: i64,
    next: JobStatus,
    exercise_count: Option<i32>,
    error_message: Option<String>,
) -> Result<(), DbErr> {
    let Some(job) = generation_job::Entity::find_by_id(job_id).one(db).await? else {
        return Ok(());
    };

    if !job.status.can_transition(next) {
        info!(
            job_id,
            from = %job.status,
            to = %next,
            "skipping stale generation job transition"
        );
        return Ok(());
    }

    let mut active: generation_job::ActiveModel = job.into();
    active.status = Set(next);
    if exercise_count.is_some() {
        active.exercise_count = Set(exercise_count);
    }
    if error_message.is_some() {
        active.error_message = Set(error_message);
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}
