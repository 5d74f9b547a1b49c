use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use db::grade::{self, GradeError};
use db::models::{
    activity::{self, ActivityStatus},
    course, enrollment,
    exercise::{self, Column as ExerciseCol},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use super::common::{enrolled_activity_for, published_activity_for};
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CourseItem {
    pub id: i64,
    pub title: String,
    pub code: String,
    pub description: Option<String>,
}

/// GET /student/courses
///
/// Lists the courses the authenticated student is enrolled in.
///
/// ### Response: 200 OK
/// ```json
/// {
///   "success": true,
///   "data": [
///     { "id": 1, "title": "Programming 1", "code": "PROG1", "description": null }
///   ],
///   "message": "Courses retrieved successfully"
/// }
/// ```
pub async fn get_courses(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    let rows = enrollment::Entity::find()
        .filter(enrollment::Column::StudentId.eq(user.0.sub))
        .find_also_related(course::Entity)
        .all(app_state.db())
        .await;

    match rows {
        Ok(rows) => {
            let courses: Vec<CourseItem> = rows
                .into_iter()
                .filter_map(|(_, course)| course)
                .map(|c| CourseItem {
                    id: c.id,
                    title: c.title,
                    code: c.code,
                    description: c.description,
                })
                .collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    courses,
                    "Courses retrieved successfully",
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "student courses: query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve courses")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityItem {
    pub id: i64,
    pub course_id: i64,
    pub course_title: String,
    pub title: String,
    pub description: String,
    pub activity_type: String,
}

/// GET /student/activities
///
/// Lists published activities across the student's enrolled courses, newest
/// first. Draft and archived activities are never included.
pub async fn get_activities(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    let course_ids: Vec<i64> = match enrollment::Entity::find()
        .filter(enrollment::Column::StudentId.eq(user.0.sub))
        .all(db)
        .await
    {
        Ok(rows) => rows.into_iter().map(|e| e.course_id).collect(),
        Err(e) => {
            tracing::error!(error = %e, "student activities: enrollment query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activities")),
            )
                .into_response();
        }
    };

    let rows = activity::Entity::find()
        .filter(activity::Column::Status.eq(ActivityStatus::Published))
        .filter(activity::Column::CourseId.is_in(course_ids))
        .find_also_related(course::Entity)
        .order_by_desc(activity::Column::CreatedAt)
        .all(db)
        .await;

    match rows {
        Ok(rows) => {
            let activities: Vec<ActivityItem> = rows
                .into_iter()
                .map(|(a, course)| ActivityItem {
                    id: a.id,
                    course_id: a.course_id,
                    course_title: course.map(|c| c.title).unwrap_or_default(),
                    title: a.title,
                    description: a.description,
                    activity_type: a.activity_type.to_string(),
                })
                .collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    activities,
                    "Activities retrieved successfully",
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "student activities: query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activities")),
            )
                .into_response()
        }
    }
}

/// Student-facing view of one exercise. The reference solution and the test
/// cases never leave the server here.
#[derive(Debug, Serialize)]
pub struct StudentExercise {
    pub id: i64,
    pub title: String,
    pub problem_statement: String,
    pub starter_code: String,
    pub language: String,
    pub difficulty: String,
    pub order_index: i32,
}

impl StudentExercise {
    fn from_model(e: exercise::Model) -> Self {
        Self {
            id: e.id,
            title: e.title,
            problem_statement: e.problem_statement,
            starter_code: e.starter_code,
            language: e.language,
            difficulty: e.difficulty,
            order_index: e.order_index,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityDetailResponse {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub activity_type: String,
    pub exercises: Vec<StudentExercise>,
}

/// GET /student/activities/{activity_id}
///
/// Full detail of one published activity, including its exercises in order.
///
/// ### Error Responses
/// - `404 Not Found`: unknown id, unpublished activity, or a course the
///   student is not enrolled in. All three are indistinguishable.
pub async fn get_activity_detail(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
) -> impl IntoResponse {
    let db = app_state.db();

    let activity = match published_activity_for(db, activity_id, user.0.sub).await {
        Ok(Some(activity)) => activity,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "student activity detail: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activity")),
            )
                .into_response();
        }
    };

    let exercises = exercise::Entity::find()
        .filter(ExerciseCol::ActivityId.eq(activity.id))
        .order_by_asc(ExerciseCol::OrderIndex)
        .all(db)
        .await;

    match exercises {
        Ok(exercises) => {
            let response = ActivityDetailResponse {
                id: activity.id,
                course_id: activity.course_id,
                title: activity.title,
                description: activity.description,
                activity_type: activity.activity_type.to_string(),
                exercises: exercises
                    .into_iter()
                    .map(StudentExercise::from_model)
                    .collect(),
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
            tracing::error!(error = %e, "student activity detail: exercise query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve activity")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExerciseResult {
    pub exercise_id: i64,
    pub title: String,
    pub grade: Option<i32>,
    pub passed: Option<bool>,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResultsResponse {
    pub activity_id: i64,
    pub grade: f64,
    pub passed: bool,
    pub general_feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub exercises: Vec<ExerciseResult>,
}

/// GET /student/activities/{activity_id}/results
///
/// The graded outcome of the student's final submission on one activity:
/// derived activity grade, per-exercise pass/fail and feedback. Stays
/// readable after the activity is archived.
///
/// ### Error Responses
/// - `404 Not Found`: unknown activity or not enrolled.
/// - `409 Conflict`: no final submission has been graded yet.
pub async fn get_activity_results(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
) -> impl IntoResponse {
    let db = app_state.db();

    match enrolled_activity_for(db, activity_id, user.0.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Activity not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "student results: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve results")),
            )
                .into_response();
        }
    }

    let graded = match grade::activity_grade(db, activity_id, user.0.sub).await {
        Ok(graded) => graded,
        Err(GradeError::NotGraded) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::<()>::error(
                    "No graded submission exists for this activity",
                )),
            )
                .into_response();
        }
        Err(GradeError::Database(e)) => {
            tracing::error!(error = %e, "student results: grade computation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve results")),
            )
                .into_response();
        }
    };

    let titles: HashMap<i64, String> = match exercise::Entity::find()
        .filter(ExerciseCol::ActivityId.eq(activity_id))
        .all(db)
        .await
    {
        Ok(exercises) => exercises.into_iter().map(|e| (e.id, e.title)).collect(),
        Err(e) => {
            tracing::error!(error = %e, "student results: exercise query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve results")),
            )
                .into_response();
        }
    };

    let response = ActivityResultsResponse {
        activity_id,
        grade: graded.grade,
        passed: graded.passed,
        general_feedback: graded.submission.general_feedback.clone(),
        submitted_at: graded.submission.submitted_at,
        exercises: graded
            .attempts
            .iter()
            .map(|a| ExerciseResult {
                exercise_id: a.exercise_id,
                title: titles.get(&a.exercise_id).cloned().unwrap_or_default(),
                grade: a.grade,
                passed: a.passed,
                feedback: a.feedback.clone(),
            })
            .collect(),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            response,
            "Results retrieved successfully",
        )),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct GradeItem {
    pub activity_id: i64,
    pub activity_title: String,
    pub course_id: i64,
    pub course_title: String,
    pub grade: f64,
    pub passed: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// GET /student/grades
///
/// Every graded activity for the authenticated student, newest submission
/// first. The activity grade is derived from the per-exercise grades at read
/// time.
pub async fn get_grades(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    let db = app_state.db();

    let grades = match grade::student_grades(db, user.0.sub).await {
        Ok(grades) => grades,
        Err(e) => {
            tracing::error!(error = %e, "student grades: query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve grades")),
            )
                .into_response();
        }
    };

    let course_ids: Vec<i64> = grades.iter().map(|g| g.activity.course_id).collect();
    let course_titles: HashMap<i64, String> = match course::Entity::find()
        .filter(course::Column::Id.is_in(course_ids))
        .all(db)
        .await
    {
        Ok(courses) => courses.into_iter().map(|c| (c.id, c.title)).collect(),
        Err(e) => {
            tracing::error!(error = %e, "student grades: course query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to retrieve grades")),
            )
                .into_response();
        }
    };

    let items: Vec<GradeItem> = grades
        .into_iter()
        .map(|g| GradeItem {
            activity_id: g.activity.id,
            activity_title: g.activity.title.clone(),
            course_id: g.activity.course_id,
            course_title: course_titles
                .get(&g.activity.course_id)
                .cloned()
                .unwrap_or_default(),
            grade: g.grade,
            passed: g.passed,
            submitted_at: g.submission.submitted_at,
        })
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(items, "Grades retrieved successfully")),
    )
        .into_response()
}
