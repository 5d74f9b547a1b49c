//! Background worker computing the AI-reliance profile of one submission.
//!
//! Enqueueing writes (or resets) the analysis row to `pending` before the
//! worker starts, so readers always see one of `pending`, `ready` or
//! `failed` rather than an absent row. The worker gathers the graded
//! attempts and the full tutoring conversation, asks the analyzer for a
//! profile and stores the outcome wholesale.

use std::collections::HashMap;
use std::sync::Arc;

use ai::{ChatTurn, RiskAnalyzer, RiskInput, RiskReport};
use chrono::Utc;
use db::grade;
use db::models::{
    activity,
    chat_message::Model as ChatMessage,
    exercise::{Column as ExerciseCol, Entity as ExerciseEntity},
    risk_analysis::{self, AnalysisStatus, RiskLevel},
    submission,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{error, info};

use crate::state::AppState;
use crate::tasks::TaskKey;

/// Resets the submission's analysis to `pending` and spawns the analyzer.
///
/// Returns `Ok(false)` without touching the row when an analysis for this
/// submission is already running.
pub async fn enqueue_risk_analysis(
    state: &AppState,
    submission: &submission::Model,
) -> Result<bool, DbErr> {
    let key = TaskKey::Risk(submission.id);
    if state.tasks().is_live(key) {
        return Ok(false);
    }

    mark_pending(state.db(), submission.id).await?;

    let db = state.db_clone();
    let analyzer = state.ai().risk.clone();
    let spawned = state
        .tasks()
        .spawn_guarded(key, run_risk_analysis(db, analyzer, submission.clone()));
    Ok(spawned)
}

async fn run_risk_analysis(
    db: DatabaseConnection,
    analyzer: Arc<dyn RiskAnalyzer>,
    submission: submission::Model,
) {
    let outcome = match gather_input(&db, &submission).await {
        Ok(input) => match analyzer.analyze(input).await {
            Ok(report) => match report.risk_level.parse::<RiskLevel>() {
                Ok(level) => {
                    info!(
                        submission_id = submission.id,
                        score = report.risk_score,
                        level = %level,
                        "risk analysis ready"
                    );
                    store_report(&db, submission.id, &report, level).await
                }
                Err(e) => store_failure(&db, submission.id, e).await,
            },
            Err(e) => store_failure(&db, submission.id, e.to_string()).await,
        },
        Err(e) => store_failure(&db, submission.id, e).await,
    };

    if let Err(e) = outcome {
        error!(
            submission_id = submission.id,
            error = %e,
            "failed to persist risk analysis outcome"
        );
    }
}

/// Assembles the analyzer's view of the submission: activity title, derived
/// grade, all submitted code and the full conversation.
async fn gather_input(
    db: &DatabaseConnection,
    submission: &submission::Model,
) -> Result<RiskInput, String> {
    let activity = activity::Entity::find_by_id(submission.activity_id)
        .one(db)
        .await
        .map_err(|e| format!("could not load activity: {e}"))?
        .ok_or_else(|| "activity no longer exists".to_string())?;

    let graded = grade::activity_grade(db, submission.activity_id, submission.student_id)
        .await
        .map_err(|e| format!("could not load graded attempts: {e}"))?;

    let exercises = ExerciseEntity::find()
        .filter(ExerciseCol::ActivityId.eq(submission.activity_id))
        .order_by_asc(ExerciseCol::OrderIndex)
        .all(db)
        .await
        .map_err(|e| format!("could not load exercises: {e}"))?;

    let attempts_by_exercise: HashMap<i64, &str> = graded
        .attempts
        .iter()
        .map(|a| (a.exercise_id, a.code.as_str()))
        .collect();
    let code = exercises
        .iter()
        .map(|e| {
            let code = attempts_by_exercise.get(&e.id).copied().unwrap_or("");
            format!("// {}\n{}", e.title, code)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let chat = ChatMessage::history(db, submission.session_id)
        .await
        .map_err(|e| format!("could not load chat history: {e}"))?
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role.to_string(),
            content: m.content,
        })
        .collect();

    Ok(RiskInput {
        activity_title: activity.title,
        final_grade: graded.grade,
        code,
        chat,
    })
}

/// Writes (or rewrites) the analysis row as `pending` with every payload
/// column cleared.
async fn mark_pending(db: &DatabaseConnection, submission_id: i64) -> Result<(), DbErr> {
    match risk_analysis::Model::find_by_submission(db, submission_id).await? {
        Some(existing) => {
            let mut active: risk_analysis::ActiveModel = existing.into();
            active.status = Set(AnalysisStatus::Pending);
            active.risk_score = Set(None);
            active.risk_level = Set(None);
            active.diagnosis = Set(None);
            active.evidence = Set(None);
            active.teacher_advice = Set(None);
            active.positive_aspects = Set(None);
            active.error_message = Set(None);
            active.analyzed_at = Set(None);
            active.updated_at = Set(Utc::now());
            active.update(db).await?;
        }
        None => {
            risk_analysis::ActiveModel {
                submission_id: Set(submission_id),
                status: Set(AnalysisStatus::Pending),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

async fn store_report(
    db: &DatabaseConnection,
    submission_id: i64,
    report: &RiskReport,
    level: RiskLevel,
) -> Result<(), DbErr> {
    let Some(row) = risk_analysis::Model::find_by_submission(db, submission_id).await? else {
        return Ok(());
    };

    let evidence = serde_json::to_string(&report.evidence).unwrap_or_else(|_| "[]".to_string());
    let positive_aspects =
        serde_json::to_string(&report.positive_aspects).unwrap_or_else(|_| "[]".to_string());

    let mut active: risk_analysis::ActiveModel = row.into();
    active.status = Set(AnalysisStatus::Ready);
    active.risk_score = Set(Some(report.risk_score));
    active.risk_level = Set(Some(level));
    active.diagnosis = Set(Some(report.diagnosis.clone()));
    active.evidence = Set(Some(evidence));
    active.teacher_advice = Set(Some(report.teacher_advice.clone()));
    active.positive_aspects = Set(Some(positive_aspects));
    active.error_message = Set(None);
    active.analyzed_at = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}

async fn store_failure(
    db: &DatabaseConnection,
    submission_id: i64,
    message: String,
) -> Result<(), DbErr> {
    error!(submission_id, error = %message, "risk analysis failed");

    let Some(row) = risk_analysis::Model::find_by_submission(db, submission_id).await? else {
        return Ok(());
    };

    let mut active: risk_analysis::ActiveModel = row.into();
    active.status = Set(AnalysisStatus::Failed);
    active.error_message = Set(Some(message));
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}
