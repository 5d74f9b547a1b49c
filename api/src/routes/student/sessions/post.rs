use std::collections::HashMap;

use ai::{AuditExercise, AuditRequest, ChatTurn, TutorContext};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::format_validation_errors;
use db::grade;
use db::models::{
    chat_message::{self, ChatRole, Model as ChatMessage},
    exercise::{self, Column as ExerciseCol},
    exercise_attempt::{self, Column as AttemptCol},
    submission::{self, SubmissionStatus},
    tutoring_session::{self, Model as Session, SessionMode, SessionStatus},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::owned_session;
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::student::common::published_activity_for;
use crate::state::AppState;
use crate::tasks::{generation::document_context, risk::enqueue_risk_analysis};

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub activity_id: i64,
    #[serde(default)]
    pub mode: SessionMode,
}

#[derive(Debug, Serialize)]
pub struct SessionRef {
    pub session_id: i64,
    pub mode: String,
    pub status: String,
}

/// POST /student/sessions
///
/// Opens a tutoring session on a published activity. If the student already
/// has an active session on it, that session is returned instead of a new
/// one, so chat history is never orphaned.
///
/// ### Request Body
/// ```json
/// { "activity_id": 12, "mode": "socratic" }
/// ```
///
/// ### Responses
/// - `201 Created`: a fresh session.
/// - `200 OK`: the existing active session was reused.
/// - `404 Not Found`: activity unknown, unpublished, or not enrolled.
pub async fn start_session(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let db = app_state.db();

    match published_activity_for(db, req.activity_id, user.0.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "start session: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to start session")),
            )
                .into_response();
        }
    }

    match Session::find_active(db, user.0.sub, req.activity_id).await {
        Ok(Some(existing)) => {
            return (
                StatusCode::OK,
                Json(ApiResponse::success(
                    SessionRef {
                        session_id: existing.id,
                        mode: existing.mode.to_string(),
                        status: existing.status.to_string(),
                    },
                    "Session resumed",
                )),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "start session: active session lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to start session")),
            )
                .into_response();
        }
    }

    let new_session = tutoring_session::ActiveModel {
        student_id: Set(user.0.sub),
        activity_id: Set(req.activity_id),
        mode: Set(req.mode.clone()),
        status: Set(SessionStatus::Active),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match new_session {
        Ok(session) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                SessionRef {
                    session_id: session.id,
                    mode: session.mode.to_string(),
                    status: session.status.to_string(),
                },
                "Session started",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "start session: insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to start session")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "Message must not be empty"))]
    pub message: String,
    pub code_context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
}

/// POST /student/sessions/{session_id}/chat
///
/// Sends one student message to the tutor and returns the tutor's reply.
/// The student turn is committed before the tutor is called: if the tutor is
/// unreachable the message is already part of the history and the client can
/// simply retry.
///
/// ### Request Body
/// ```json
/// { "message": "Why does my loop never end?", "code_context": "while i < n:" }
/// ```
///
/// ### Responses
/// - `200 OK`: `{ "content": "<tutor reply>" }`
/// - `404 Not Found`: unknown or foreign session.
/// - `409 Conflict`: the session was already submitted.
/// - `502 Bad Gateway`: the tutor did not answer; the student turn is kept.
pub async fn chat(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(format_validation_errors(
                &validation_errors,
            ))),
        )
            .into_response();
    }

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
            tracing::error!(error = %e, "chat: session lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to send message")),
            )
                .into_response();
        }
    };

    if session.status == SessionStatus::Submitted {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error("Session already submitted")),
        )
            .into_response();
    }

    let context = match build_tutor_context(db, &session, &req).await {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(error = %e, "chat: context assembly failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to send message")),
            )
                .into_response();
        }
    };

    // Commit the student turn before the tutor call so it survives failures.
    let student_turn = chat_message::ActiveModel {
        session_id: Set(session.id),
        role: Set(ChatRole::Student),
        content: Set(req.message.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await;

    if let Err(e) = student_turn {
        tracing::error!(error = %e, "chat: student turn insert failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error("Failed to send message")),
        )
            .into_response();
    }

    let reply = match app_state.ai().tutor.tutor_reply(context).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(session_id = session.id, error = %e, "tutor call failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::<()>::error(
                    "The tutor is unavailable right now. Your message was saved, please try again.",
                )),
            )
                .into_response();
        }
    };

    let tutor_turn = chat_message::ActiveModel {
        session_id: Set(session.id),
        role: Set(ChatRole::Tutor),
        content: Set(reply.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match tutor_turn {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                ChatResponse { content: reply },
                "Message sent",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "chat: tutor turn insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to send message")),
            )
                .into_response()
        }
    }
}

/// Assembles the tutor's view: exercise statements, reference solutions,
/// course material and the conversation so far. The history is read before
/// the current message is inserted so the prompt does not repeat it.
async fn build_tutor_context(
    db: &DatabaseConnection,
    session: &Session,
    req: &ChatRequest,
) -> Result<TutorContext, DbErr> {
    let exercises = exercise::Entity::find()
        .filter(ExerciseCol::ActivityId.eq(session.activity_id))
        .order_by_asc(ExerciseCol::OrderIndex)
        .all(db)
        .await?;

    let problem_statement = exercises
        .iter()
        .map(|e| format!("Exercise: {}\n{}", e.title, e.problem_statement))
        .collect::<Vec<_>>()
        .join("\n\n");
    let solution_code = exercises
        .iter()
        .map(|e| format!("// {}\n{}", e.title, e.solution_code))
        .collect::<Vec<_>>()
        .join("\n\n");

    let history: Vec<ChatTurn> = ChatMessage::history(db, session.id)
        .await?
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role.to_string(),
            content: m.content,
        })
        .collect();

    Ok(TutorContext {
        mode: session.mode.to_string(),
        message: req.message.clone(),
        code_context: req.code_context.clone(),
        problem_statement,
        solution_code,
        document_context: document_context(db, session.activity_id).await?,
        history,
    })
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub exercise_id: i64,
    pub code: String,
    #[serde(default)]
    pub is_final_submission: bool,
    /// Final submissions may carry the latest code for every exercise at
    /// once, keyed by exercise id.
    #[serde(default)]
    pub all_exercise_codes: Option<HashMap<i64, String>>,
}

#[derive(Debug, Serialize)]
pub struct ProgressSaved {
    pub submission_id: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ExerciseAuditItem {
    pub exercise_id: i64,
    pub title: String,
    pub grade: i32,
    pub passed: bool,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitDetails {
    pub exercises_audit: Vec<ExerciseAuditItem>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub passed: bool,
    pub grade: f64,
    pub feedback: String,
    pub details: SubmitDetails,
}

/// POST /student/sessions/{session_id}/submit
///
/// Records code for one exercise. Non-final submits save progress without
/// grading. A final submit grades every exercise in the activity in one
/// aggregated pass, closes the session and schedules the risk analysis.
///
/// ### Request Body
/// ```json
/// {
///   "exercise_id": 3,
///   "code": "def solve(): ...",
///   "is_final_submission": true,
///   "all_exercise_codes": { "3": "def solve(): ...", "4": "print(1)" }
/// }
/// ```
///
/// ### Responses
/// - `200 OK` (non-final): `{ "submission_id": 9, "status": "in_progress" }`
/// - `200 OK` (final): grade, pass flag, feedback and the per-exercise audit.
/// - `404 Not Found`: unknown session or an exercise outside the activity.
/// - `409 Conflict`: the session was already submitted.
pub async fn submit(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Json(req): Json<SubmitRequest>,
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
            tracing::error!(error = %e, "submit: session lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to submit")),
            )
                .into_response();
        }
    };

    if session.status == SessionStatus::Submitted {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error("Activity already submitted")),
        )
            .into_response();
    }

    // A later session must not produce a second submission once a previous
    // one on the same activity was graded.
    match submission::Model::find_by_activity_and_student(db, session.activity_id, user.0.sub)
        .await
    {
        Ok(Some(previous)) if previous.status == SubmissionStatus::Graded => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::<()>::error("Activity already submitted")),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "submit: previous submission lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to submit")),
            )
                .into_response();
        }
    }

    let exercises = match exercise::Entity::find()
        .filter(ExerciseCol::ActivityId.eq(session.activity_id))
        .order_by_asc(ExerciseCol::OrderIndex)
        .all(db)
        .await
    {
        Ok(exercises) => exercises,
        Err(e) => {
            tracing::error!(error = %e, "submit: exercise query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to submit")),
            )
                .into_response();
        }
    };

    if !exercises.iter().any(|e| e.id == req.exercise_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error("Exercise not found")),
        )
            .into_response();
    }

    let submission = match find_or_create_submission(db, &session).await {
        Ok(submission) => submission,
        Err(e) => {
            tracing::error!(error = %e, "submit: submission upsert failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to submit")),
            )
                .into_response();
        }
    };

    if let Err(e) = record_codes(db, submission.id, &req, &exercises).await {
        tracing::error!(error = %e, "submit: attempt upsert failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error("Failed to submit")),
        )
            .into_response();
    }

    if !req.is_final_submission {
        return (
            StatusCode::OK,
            Json(ApiResponse::success(
                ProgressSaved {
                    submission_id: submission.id,
                    status: SubmissionStatus::InProgress.to_string(),
                },
                "Progress saved",
            )),
        )
            .into_response();
    }

    match grade_final_submission(&app_state, &session, submission, &exercises).await {
        Ok(response) => (
            StatusCode::OK,
            Json(ApiResponse::success(response, "Submission graded")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "submit: final grading failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to submit")),
            )
                .into_response()
        }
    }
}

async fn find_or_create_submission(
    db: &DatabaseConnection,
    session: &Session,
) -> Result<submission::Model, DbErr> {
    if let Some(existing) = submission::Model::find_by_session(db, session.id).await? {
        return Ok(existing);
    }

    submission::ActiveModel {
        session_id: Set(session.id),
        student_id: Set(session.student_id),
        activity_id: Set(session.activity_id),
        status: Set(SubmissionStatus::InProgress),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Records the submitted code: the addressed exercise first, then any bulk
/// codes limited to exercises that actually belong to the activity.
async fn record_codes(
    db: &DatabaseConnection,
    submission_id: i64,
    req: &SubmitRequest,
    exercises: &[exercise::Model],
) -> Result<(), DbErr> {
    upsert_attempt_code(db, submission_id, req.exercise_id, &req.code).await?;

    if let Some(all_codes) = &req.all_exercise_codes {
        for (exercise_id, code) in all_codes {
            if *exercise_id == req.exercise_id {
                continue;
            }
            if exercises.iter().any(|e| e.id == *exercise_id) {
                upsert_attempt_code(db, submission_id, *exercise_id, code).await?;
            }
        }
    }
    Ok(())
}

async fn upsert_attempt_code(
    db: &DatabaseConnection,
    submission_id: i64,
    exercise_id: i64,
    code: &str,
) -> Result<(), DbErr> {
    let existing = exercise_attempt::Entity::find()
        .filter(AttemptCol::SubmissionId.eq(submission_id))
        .filter(AttemptCol::ExerciseId.eq(exercise_id))
        .one(db)
        .await?;

    match existing {
        Some(attempt) => {
            let mut active: exercise_attempt::ActiveModel = attempt.into();
            active.code = Set(code.to_string());
            active.updated_at = Set(Utc::now());
            active.update(db).await?;
        }
        None => {
            exercise_attempt::ActiveModel {
                submission_id: Set(submission_id),
                exercise_id: Set(exercise_id),
                code: Set(code.to_string()),
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

/// Grades every exercise of the activity in one auditor pass and finalizes
/// the submission and session.
///
/// The per-exercise grades written here are the persisted truth; the
/// activity grade in the response is their mean, derived on the spot.
/// Exercises the auditor skipped are graded 0. The risk analysis is
/// scheduled last so its pending state is visible by the time the client
/// sees this response.
async fn grade_final_submission(
    state: &AppState,
    session: &Session,
    submission: submission::Model,
    exercises: &[exercise::Model],
) -> Result<SubmitResponse, DbErr> {
    let db = state.db();

    // Every exercise gets an attempt row, empty code for the untouched ones.
    for exercise in exercises {
        let exists = exercise_attempt::Entity::find()
            .filter(AttemptCol::SubmissionId.eq(submission.id))
            .filter(AttemptCol::ExerciseId.eq(exercise.id))
            .one(db)
            .await?
            .is_some();
        if !exists {
            upsert_attempt_code(db, submission.id, exercise.id, "").await?;
        }
    }

    let attempts = exercise_attempt::Entity::find()
        .filter(AttemptCol::SubmissionId.eq(submission.id))
        .all(db)
        .await?;
    let code_by_exercise: HashMap<i64, String> = attempts
        .iter()
        .map(|a| (a.exercise_id, a.code.clone()))
        .collect();

    let report = state
        .ai()
        .auditor
        .audit(AuditRequest {
            exercises: exercises
                .iter()
                .map(|e| AuditExercise {
                    exercise_id: e.id,
                    title: e.title.clone(),
                    problem_statement: e.problem_statement.clone(),
                    code: code_by_exercise.get(&e.id).cloned().unwrap_or_default(),
                })
                .collect(),
        })
        .await;

    let audit_by_exercise: HashMap<i64, &ai::ExerciseAudit> = report
        .exercises_audit
        .iter()
        .map(|a| (a.exercise_id, a))
        .collect();

    let mut items = Vec::with_capacity(exercises.len());
    let mut grades = Vec::with_capacity(exercises.len());
    for exercise in exercises {
        let entry = audit_by_exercise.get(&exercise.id);
        let grade_value = entry.map(|a| a.grade).unwrap_or(0);
        let feedback = entry.map(|a| a.feedback.clone());
        let passed = grade::is_passing(grade_value);

        let attempt = attempts
            .iter()
            .find(|a| a.exercise_id == exercise.id)
            .cloned();
        if let Some(attempt) = attempt {
            let mut active: exercise_attempt::ActiveModel = attempt.into();
            active.grade = Set(Some(grade_value));
            active.passed = Set(Some(passed));
            active.feedback = Set(feedback.clone());
            active.updated_at = Set(Utc::now());
            active.update(db).await?;
        }

        grades.push(grade_value);
        items.push(ExerciseAuditItem {
            exercise_id: exercise.id,
            title: exercise.title.clone(),
            grade: grade_value,
            passed,
            feedback,
        });
    }

    let mut active: submission::ActiveModel = submission.clone().into();
    active.status = Set(SubmissionStatus::Graded);
    active.general_feedback = Set(Some(report.general_feedback.clone()));
    active.submitted_at = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    let submission = active.update(db).await?;

    let mut active: tutoring_session::ActiveModel = session.clone().into();
    active.status = Set(SessionStatus::Submitted);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;

    if let Err(e) = enqueue_risk_analysis(state, &submission).await {
        tracing::error!(
            submission_id = submission.id,
            error = %e,
            "submit: failed to enqueue risk analysis"
        );
    }

    let activity_grade = grade::mean_grade(&grades).unwrap_or(0.0);
    Ok(SubmitResponse {
        passed: activity_grade >= grade::PASSING_GRADE as f64,
        grade: activity_grade,
        feedback: report.general_feedback,
        details: SubmitDetails {
            exercises_audit: items,
        },
    })
}
