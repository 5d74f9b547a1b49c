use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use db::grade::{mean_grade, round1};
use db::models::{
    activity::{self, ActivityStatus},
    chat_message::{Column as ChatCol, Entity as ChatEntity},
    course, enrollment,
    exercise::{self, Column as ExerciseCol},
    exercise_attempt::{self, Column as AttemptCol},
    risk_analysis::{self, AnalysisStatus},
    submission::{self, Column as SubCol, SubmissionStatus},
    tutoring_session::{Column as SessionCol, Entity as SessionEntity},
    user::{self, UserRole},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use serde_json::Value;

use super::common::{owned_activity, owned_course};
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TeacherCourseItem {
    pub id: i64,
    pub title: String,
    pub code: String,
    pub description: Option<String>,
    pub student_count: usize,
    pub created_at: DateTime<Utc>,
}

/// GET /teacher/courses
///
/// Lists the authenticated teacher's courses with enrollment counts, newest
/// first.
pub async fn get_courses(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    let courses = match course::Entity::find()
        .filter(course::Column::TeacherId.eq(user.0.sub))
        .order_by_desc(course::Column::CreatedAt)
        .all(db)
        .await
    {
        Ok(courses) => courses,
        Err(e) => {
            tracing::error!(error = %e, "teacher courses: query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve courses")),
            )
                .into_response();
        }
    };

    let course_ids: Vec<i64> = courses.iter().map(|c| c.id).collect();
    let enrollments = match enrollment::Entity::find()
        .filter(enrollment::Column::CourseId.is_in(course_ids))
        .all(db)
        .await
    {
        Ok(enrollments) => enrollments,
        Err(e) => {
            tracing::error!(error = %e, "teacher courses: enrollment query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve courses")),
            )
                .into_response();
        }
    };

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for enrollment in &enrollments {
        *counts.entry(enrollment.course_id).or_default() += 1;
    }

    let items: Vec<TeacherCourseItem> = courses
        .into_iter()
        .map(|c| TeacherCourseItem {
            student_count: counts.get(&c.id).copied().unwrap_or(0),
            id: c.id,
            title: c.title,
            code: c.code,
            description: c.description,
            created_at: c.created_at,
        })
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            items,
            "Courses retrieved successfully",
        )),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct TeacherActivityItem {
    pub id: i64,
    pub course_id: i64,
    pub course_title: String,
    pub title: String,
    pub description: String,
    pub activity_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// GET /teacher/activities
///
/// Every activity across the teacher's courses, drafts included, newest
/// first.
pub async fn get_activities(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    let course_ids: Vec<i64> = match course::Entity::find()
        .filter(course::Column::TeacherId.eq(user.0.sub))
        .all(db)
        .await
    {
        Ok(courses) => courses.into_iter().map(|c| c.id).collect(),
        Err(e) => {
            tracing::error!(error = %e, "teacher activities: course query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activities")),
            )
                .into_response();
        }
    };

    let rows = activity::Entity::find()
        .filter(activity::Column::CourseId.is_in(course_ids))
        .find_also_related(course::Entity)
        .order_by_desc(activity::Column::CreatedAt)
        .all(db)
        .await;

    match rows {
        Ok(rows) => {
            let items: Vec<TeacherActivityItem> = rows
                .into_iter()
                .map(|(a, course)| TeacherActivityItem {
                    id: a.id,
                    course_id: a.course_id,
                    course_title: course.map(|c| c.title).unwrap_or_default(),
                    title: a.title,
                    description: a.description,
                    activity_type: a.activity_type.to_string(),
                    status: a.status.to_string(),
                    created_at: a.created_at,
                })
                .collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    items,
                    "Activities retrieved successfully",
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "teacher activities: query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activities")),
            )
                .into_response()
        }
    }
}

/// Teacher-facing view of one exercise, reference solution included.
#[derive(Debug, Serialize)]
pub struct TeacherExercise {
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

impl TeacherExercise {
    fn from_model(e: exercise::Model) -> Self {
        Self {
            id: e.id,
            title: e.title,
            problem_statement: e.problem_statement,
            starter_code: e.starter_code,
            solution_code: e.solution_code,
            language: e.language,
            difficulty: e.difficulty,
            order_index: e.order_index,
            test_cases: e.test_cases.as_deref().and_then(|s| serde_json::from_str(s).ok()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeacherActivityDetail {
    pub id: i64,
    pub course_id: i64,
    pub course_title: String,
    pub title: String,
    pub description: String,
    pub activity_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub exercises: Vec<TeacherExercise>,
}

/// GET /teacher/activities/{activity_id}
///
/// Full activity detail for its owner, exercises with reference solutions
/// included.
///
/// ### Error Responses
/// - `404 Not Found`: unknown activity or one owned by another teacher.
pub async fn get_activity(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
) -> impl IntoResponse {
    let db = app_state.db();

    let (activity, course) = match owned_activity(db, activity_id, user.0.sub).await {
        Ok(Some(pair)) => pair,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "teacher activity detail: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activity")),
            )
                .into_response();
        }
    };

    match activity_exercises(db, activity.id).await {
        Ok(exercises) => {
            let response = TeacherActivityDetail {
                id: activity.id,
                course_id: activity.course_id,
                course_title: course.title,
                title: activity.title,
                description: activity.description,
                activity_type: activity.activity_type.to_string(),
                status: activity.status.to_string(),
                created_at: activity.created_at,
                exercises,
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    response,
                    "Activity retrieved successfully",
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "teacher activity detail: exercise query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activity")),
            )
                .into_response()
        }
    }
}

/// GET /teacher/activities/{activity_id}/exercises
///
/// Just the exercise list of one owned activity, solutions included.
pub async fn get_activity_exercises(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
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
            tracing::error!(error = %e, "teacher exercises: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve exercises")),
            )
                .into_response();
        }
    }

    match activity_exercises(db, activity_id).await {
        Ok(exercises) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                exercises,
                "Exercises retrieved successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "teacher exercises: query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve exercises")),
            )
                .into_response()
        }
    }
}

async fn activity_exercises(
    db: &sea_orm::DatabaseConnection,
    activity_id: i64,
) -> Result<Vec<TeacherExercise>, sea_orm::DbErr> {
    let exercises = exercise::Entity::find()
        .filter(ExerciseCol::ActivityId.eq(activity_id))
        .order_by_asc(ExerciseCol::OrderIndex)
        .all(db)
        .await?;
    Ok(exercises.into_iter().map(TeacherExercise::from_model).collect())
}

#[derive(Debug, Serialize)]
pub struct StudentProgressItem {
    pub student_id: i64,
    pub email: String,
    pub full_name: String,
    pub total_exercises: usize,
    pub submitted_exercises: usize,
    pub avg_score: Option<f64>,
    pub progress_percentage: f64,
    pub status: String,
}

/// GET /teacher/activities/{activity_id}/students
///
/// Per-student progress on one activity across everyone enrolled in its
/// course: how many exercises carry code, the derived average score once
/// graded, and a coarse `not_started` / `in_progress` / `graded` status.
pub async fn get_activity_students(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
) -> impl IntoResponse {
    let db = app_state.db();

    let (activity, _course) = match owned_activity(db, activity_id, user.0.sub).await {
        Ok(Some(pair)) => pair,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "activity students: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve students")),
            )
                .into_response();
        }
    };

    let result: Result<Vec<StudentProgressItem>, sea_orm::DbErr> = async {
        let students: Vec<(enrollment::Model, Option<user::Model>)> = enrollment::Entity::find()
            .filter(enrollment::Column::CourseId.eq(activity.course_id))
            .find_also_related(user::Entity)
            .all(db)
            .await?;

        let total_exercises = exercise::Entity::find()
            .filter(ExerciseCol::ActivityId.eq(activity.id))
            .all(db)
            .await?
            .len();

        let sessions = SessionEntity::find()
            .filter(SessionCol::ActivityId.eq(activity.id))
            .all(db)
            .await?;
        let has_session: HashSet<i64> = sessions.iter().map(|s| s.student_id).collect();

        let submissions = submission::Entity::find()
            .filter(SubCol::ActivityId.eq(activity.id))
            .all(db)
            .await?;
        let submission_ids: Vec<i64> = submissions.iter().map(|s| s.id).collect();
        let by_student: HashMap<i64, &submission::Model> =
            submissions.iter().map(|s| (s.student_id, s)).collect();

        let attempts = exercise_attempt::Entity::find()
            .filter(AttemptCol::SubmissionId.is_in(submission_ids))
            .all(db)
            .await?;
        let mut attempts_by_submission: HashMap<i64, Vec<&exercise_attempt::Model>> =
            HashMap::new();
        for attempt in &attempts {
            attempts_by_submission
                .entry(attempt.submission_id)
                .or_default()
                .push(attempt);
        }

        let items = students
            .into_iter()
            .filter_map(|(_, student)| student)
            .map(|student| {
                let submission = by_student.get(&student.id);
                let attempts = submission
                    .and_then(|s| attempts_by_submission.get(&s.id))
                    .map(|v| v.as_slice())
                    .unwrap_or(&[]);

                let submitted_exercises =
                    attempts.iter().filter(|a| !a.code.is_empty()).count();
                let grades: Vec<i32> = attempts.iter().filter_map(|a| a.grade).collect();
                let graded = submission
                    .map(|s| s.status == SubmissionStatus::Graded)
                    .unwrap_or(false);

                let status = if graded {
                    "graded"
                } else if has_session.contains(&student.id) {
                    "in_progress"
                } else {
                    "not_started"
                };

                let progress_percentage = if total_exercises == 0 {
                    0.0
                } else {
                    round1(submitted_exercises as f64 / total_exercises as f64 * 100.0)
                };

                StudentProgressItem {
                    student_id: student.id,
                    email: student.email,
                    full_name: student.full_name,
                    total_exercises,
                    submitted_exercises,
                    avg_score: if graded { mean_grade(&grades) } else { None },
                    progress_percentage,
                    status: status.to_string(),
                }
            })
            .collect();
        Ok(items)
    }
    .await;

    match result {
        Ok(items) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                items,
                "Students retrieved successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "activity students: query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve students")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttemptInfo {
    pub code: String,
    pub grade: Option<i32>,
    pub passed: Option<bool>,
    pub feedback: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExerciseWithAttempt {
    pub id: i64,
    pub title: String,
    pub problem_statement: String,
    pub order_index: i32,
    pub attempt: Option<AttemptInfo>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryItem {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionInfo {
    pub id: i64,
    pub status: String,
    pub general_feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Tri-state risk analysis payload. The score and narrative fields are only
/// populated when `status` is `ready`; `error_message` only when `failed`.
#[derive(Debug, Serialize)]
pub struct RiskPayload {
    pub status: String,
    pub risk_score: Option<i32>,
    pub risk_level: Option<String>,
    pub diagnosis: Option<String>,
    pub evidence: Vec<String>,
    pub teacher_advice: Option<String>,
    pub positive_aspects: Vec<String>,
    pub error_message: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl RiskPayload {
    fn from_model(r: &risk_analysis::Model) -> Self {
        Self {
            status: r.status.to_string(),
            risk_score: r.risk_score,
            risk_level: r.risk_level.map(|l| l.to_string()),
            diagnosis: r.diagnosis.clone(),
            evidence: decode_string_list(r.evidence.as_deref()),
            teacher_advice: r.teacher_advice.clone(),
            positive_aspects: decode_string_list(r.positive_aspects.as_deref()),
            error_message: r.error_message.clone(),
            analyzed_at: r.analyzed_at,
        }
    }
}

fn decode_string_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct StudentRef {
    pub id: i64,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
pub struct StudentDetailsResponse {
    pub student: StudentRef,
    pub activity_id: i64,
    pub exercises: Vec<ExerciseWithAttempt>,
    pub chat_history: Vec<ChatHistoryItem>,
    pub submission: Option<SubmissionInfo>,
    pub risk_analysis: Option<RiskPayload>,
}

/// GET /teacher/activities/{activity_id}/students/{student_id}/details
///
/// Everything a teacher reviews for one student on one activity: each
/// exercise with the student's attempt, the complete tutoring conversation,
/// the submission outcome and the risk analysis in its tri-state form
/// (`pending` / `ready` / `failed`; `null` when never scheduled).
///
/// ### Error Responses
/// - `404 Not Found`: foreign activity, or the student does not exist.
pub async fn get_student_details(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((activity_id, student_id)): Path<(i64, i64)>,
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
            tracing::error!(error = %e, "student details: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve details")),
            )
                .into_response();
        }
    }

    let student = match user::Entity::find_by_id(student_id).one(db).await {
        Ok(Some(student)) if student.role == UserRole::Student => student,
        Ok(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Student not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "student details: user lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve details")),
            )
                .into_response();
        }
    };

    let result: Result<StudentDetailsResponse, sea_orm::DbErr> = async {
        let exercises = exercise::Entity::find()
            .filter(ExerciseCol::ActivityId.eq(activity_id))
            .order_by_asc(ExerciseCol::OrderIndex)
            .all(db)
            .await?;

        let submission =
            submission::Model::find_by_activity_and_student(db, activity_id, student.id).await?;

        let attempts: HashMap<i64, exercise_attempt::Model> = match &submission {
            Some(s) => exercise_attempt::Entity::find()
                .filter(AttemptCol::SubmissionId.eq(s.id))
                .all(db)
                .await?
                .into_iter()
                .map(|a| (a.exercise_id, a))
                .collect(),
            None => HashMap::new(),
        };

        let session_ids: Vec<i64> = SessionEntity::find()
            .filter(SessionCol::ActivityId.eq(activity_id))
            .filter(SessionCol::StudentId.eq(student.id))
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let chat_history: Vec<ChatHistoryItem> = ChatEntity::find()
            .filter(ChatCol::SessionId.is_in(session_ids))
            .order_by_asc(ChatCol::CreatedAt)
            .order_by_asc(ChatCol::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|m| ChatHistoryItem {
                role: m.role.to_string(),
                content: m.content,
                timestamp: m.created_at,
            })
            .collect();

        let risk = match &submission {
            Some(s) => risk_analysis::Model::find_by_submission(db, s.id)
                .await?
                .map(|r| RiskPayload::from_model(&r)),
            None => None,
        };

        Ok(StudentDetailsResponse {
            student: StudentRef {
                id: student.id,
                email: student.email.clone(),
                full_name: student.full_name.clone(),
            },
            activity_id,
            exercises: exercises
                .into_iter()
                .map(|e| {
                    let attempt = attempts.get(&e.id).map(|a| AttemptInfo {
                        code: a.code.clone(),
                        grade: a.grade,
                        passed: a.passed,
                        feedback: a.feedback.clone(),
                        updated_at: a.updated_at,
                    });
                    ExerciseWithAttempt {
                        id: e.id,
                        title: e.title,
                        problem_statement: e.problem_statement,
                        order_index: e.order_index,
                        attempt,
                    }
                })
                .collect(),
            chat_history,
            submission: submission.map(|s| SubmissionInfo {
                id: s.id,
                status: s.status.to_string(),
                general_feedback: s.general_feedback,
                submitted_at: s.submitted_at,
            }),
            risk_analysis: risk,
        })
    }
    .await;

    match result {
        Ok(response) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                response,
                "Details retrieved successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "student details: query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve details")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentRiskProfile {
    pub student_id: i64,
    pub email: String,
    pub full_name: String,
    pub graded_activities: usize,
    pub average_grade: Option<f64>,
    pub risk_score: Option<i32>,
    pub risk_level: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CourseAnalyticsResponse {
    pub course_id: i64,
    pub total_students: usize,
    pub published_activities: usize,
    pub completion_rate: f64,
    pub average_risk_score: Option<f64>,
    pub students_at_risk: usize,
    pub student_profiles: Vec<StudentRiskProfile>,
}

/// GET /teacher/courses/{course_id}/analytics
///
/// Aggregate view over one course, computed at read time from submissions
/// and risk analyses; nothing here is stored.
///
/// - `completion_rate`: graded submissions over (students x published
///   activities), as a percentage.
/// - `average_risk_score`: mean over `ready` analyses, `null` without any.
/// - `students_at_risk`: students with at least one HIGH or CRITICAL
///   analysis.
/// - per-student profile: derived average grade and the worst risk level
///   observed.
pub async fn get_course_analytics(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<i64>,
) -> impl IntoResponse {
    let db = app_state.db();

    let course = match owned_course(db, course_id, user.0.sub).await {
        Ok(Some(course)) => course,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Course not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "course analytics: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to compute analytics")),
            )
                .into_response();
        }
    };

    let result: Result<CourseAnalyticsResponse, sea_orm::DbErr> = async {
        let students: Vec<user::Model> = enrollment::Entity::find()
            .filter(enrollment::Column::CourseId.eq(course.id))
            .find_also_related(user::Entity)
            .all(db)
            .await?
            .into_iter()
            .filter_map(|(_, u)| u)
            .collect();

        let published_ids: Vec<i64> = activity::Entity::find()
            .filter(activity::Column::CourseId.eq(course.id))
            .filter(activity::Column::Status.eq(ActivityStatus::Published))
            .all(db)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        let published_activities = published_ids.len();

        let graded: Vec<submission::Model> = submission::Entity::find()
            .filter(SubCol::ActivityId.is_in(published_ids))
            .filter(SubCol::Status.eq(SubmissionStatus::Graded))
            .all(db)
            .await?;
        let submission_ids: Vec<i64> = graded.iter().map(|s| s.id).collect();

        let attempts = exercise_attempt::Entity::find()
            .filter(AttemptCol::SubmissionId.is_in(submission_ids.clone()))
            .all(db)
            .await?;
        let mut grades_by_submission: HashMap<i64, Vec<i32>> = HashMap::new();
        for attempt in &attempts {
            if let Some(grade) = attempt.grade {
                grades_by_submission
                    .entry(attempt.submission_id)
                    .or_default()
                    .push(grade);
            }
        }

        let analyses = risk_analysis::Entity::find()
            .filter(risk_analysis::Column::SubmissionId.is_in(submission_ids))
            .filter(risk_analysis::Column::Status.eq(AnalysisStatus::Ready))
            .all(db)
            .await?;
        let student_by_submission: HashMap<i64, i64> =
            graded.iter().map(|s| (s.id, s.student_id)).collect();

        let ready_scores: Vec<i32> = analyses.iter().filter_map(|a| a.risk_score).collect();
        let average_risk_score = if ready_scores.is_empty() {
            None
        } else {
            let sum: i64 = ready_scores.iter().map(|s| *s as i64).sum();
            Some(round1(sum as f64 / ready_scores.len() as f64))
        };

        // Worst ready analysis per student, ordered LOW < MEDIUM < HIGH <
        // CRITICAL.
        let mut worst_by_student: HashMap<i64, (risk_analysis::RiskLevel, i32)> = HashMap::new();
        for analysis in &analyses {
            let Some(student_id) = student_by_submission.get(&analysis.submission_id) else {
                continue;
            };
            let (Some(level), Some(score)) = (analysis.risk_level, analysis.risk_score) else {
                continue;
            };
            worst_by_student
                .entry(*student_id)
                .and_modify(|worst| {
                    if level > worst.0 {
                        *worst = (level, score);
                    }
                })
                .or_insert((level, score));
        }
        let students_at_risk = worst_by_student
            .values()
            .filter(|(level, _)| level.is_at_risk())
            .count();

        let mut activity_grades_by_student: HashMap<i64, Vec<f64>> = HashMap::new();
        for submission in &graded {
            let grades = grades_by_submission
                .get(&submission.id)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            let activity_grade = mean_grade(grades).unwrap_or(0.0);
            activity_grades_by_student
                .entry(submission.student_id)
                .or_default()
                .push(activity_grade);
        }

        let total_students = students.len();
        let denominator = total_students * published_activities;
        let completion_rate = if denominator == 0 {
            0.0
        } else {
            round1(graded.len() as f64 / denominator as f64 * 100.0)
        };

        let student_profiles = students
            .into_iter()
            .map(|student| {
                let activity_grades = activity_grades_by_student
                    .get(&student.id)
                    .map(|v| v.as_slice())
                    .unwrap_or(&[]);
                let average_grade = if activity_grades.is_empty() {
                    None
                } else {
                    Some(round1(
                        activity_grades.iter().sum::<f64>() / activity_grades.len() as f64,
                    ))
                };
                let worst = worst_by_student.get(&student.id);
                StudentRiskProfile {
                    student_id: student.id,
                    email: student.email,
                    full_name: student.full_name,
                    graded_activities: activity_grades.len(),
                    average_grade,
                    risk_score: worst.map(|(_, score)| *score),
                    risk_level: worst.map(|(level, _)| level.to_string()),
                }
            })
            .collect();

        Ok(CourseAnalyticsResponse {
            course_id: course.id,
            total_students,
            published_activities,
            completion_rate,
            average_risk_score,
            students_at_risk,
            student_profiles,
        })
    }
    .await;

    match result {
        Ok(response) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                response,
                "Analytics computed successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "course analytics: query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to compute analytics")),
            )
                .into_response()
        }
    }
}
