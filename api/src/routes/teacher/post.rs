use std::str::FromStr;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::format_validation_errors;
use db::models::{
    activity::{self, ActivityStatus, ActivityType},
    course, enrollment,
    submission::{self, SubmissionStatus},
    user::{self, UserRole},
};
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::{owned_activity, owned_course};
use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::tasks::risk::enqueue_risk_analysis;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, message = "Course title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Course code must not be empty"))]
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CourseCreatedResponse {
    pub id: i64,
    pub title: String,
    pub code: String,
}

/// POST /teacher/courses
///
/// Creates a course owned by the authenticated teacher.
///
/// ### Request Body
/// ```json
/// {
///   "title": "Systems Programming",
///   "code": "CS301",
///   "description": "Memory, concurrency and the machine."
/// }
/// ```
///
/// ### Error Responses
/// - `400 Bad Request`: empty title or code.
/// - `409 Conflict`: the code is already taken.
pub async fn create_course(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateCourseRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(format_validation_errors(&errors))),
        )
            .into_response();
    }

    let now = Utc::now();
    let model = course::ActiveModel {
        title: Set(req.title),
        code: Set(req.code),
        description: Set(req.description),
        teacher_id: Set(user.0.sub),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match model.insert(app_state.db()).await {
        Ok(course) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                CourseCreatedResponse {
                    id: course.id,
                    title: course.title,
                    code: course.code,
                },
                "Course created successfully",
            )),
        )
            .into_response(),
        Err(e) if e.to_string().contains("UNIQUE constraint failed: courses.code") => (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error(
                "A course with this code already exists",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "create course: insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to create course")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateActivityRequest {
    pub course_id: i64,
    #[validate(length(min = 1, message = "Activity title must not be empty"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub activity_type: String,
}

#[derive(Debug, Serialize)]
pub struct ActivityCreatedResponse {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub activity_type: String,
    pub status: String,
}

/// POST /teacher/activities
///
/// Creates an activity in one of the teacher's courses. Most kinds start as
/// `draft`; modules are published immediately.
///
/// ### Error Responses
/// - `400 Bad Request`: empty title or unknown `activity_type`.
/// - `404 Not Found`: course missing or owned by another teacher.
pub async fn create_activity(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateActivityRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(format_validation_errors(&errors))),
        )
            .into_response();
    }

    let activity_type = match ActivityType::from_str(&req.activity_type) {
        Ok(activity_type) => activity_type,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(
                    "Activity type must be one of practice, exam, tutorial, module, coding, reading",
                )),
            )
                .into_response();
        }
    };

    match owned_course(app_state.db(), req.course_id, user.0.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Course not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "create activity: course lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to create activity")),
            )
                .into_response();
        }
    }

    let now = Utc::now();
    let model = activity::ActiveModel {
        course_id: Set(req.course_id),
        title: Set(req.title),
        description: Set(req.description),
        activity_type: Set(activity_type.clone()),
        status: Set(activity_type.initial_status()),
        created_by: Set(user.0.sub),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match model.insert(app_state.db()).await {
        Ok(activity) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                ActivityCreatedResponse {
                    id: activity.id,
                    course_id: activity.course_id,
                    title: activity.title,
                    activity_type: activity.activity_type.to_string(),
                    status: activity.status.to_string(),
                },
                "Activity created successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "create activity: insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to create activity")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub id: i64,
    pub status: String,
}

/// POST /teacher/activities/{activity_id}/publish
///
/// Publishes an activity. Publishing an already-published activity is a
/// no-op that still returns `200 OK`.
pub async fn publish_activity(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<i64>,
) -> impl IntoResponse {
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
            tracing::error!(error = %e, "publish activity: lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to publish activity")),
            )
                .into_response();
        }
    };

    if activity.status == ActivityStatus::Published {
        return (
            StatusCode::OK,
            Json(ApiResponse::success(
                PublishResponse {
                    id: activity.id,
                    status: activity.status.to_string(),
                },
                "Activity published successfully",
            )),
        )
            .into_response();
    }

    let mut active: activity::ActiveModel = activity.into();
    active.status = Set(ActivityStatus::Published);
    active.updated_at = Set(Utc::now());

    match active.update(db).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                PublishResponse {
                    id: updated.id,
                    status: updated.status.to_string(),
                },
                "Activity published successfully",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "publish activity: update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to publish activity")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnrollRequest {
    #[validate(email(message = "A valid student email is required"))]
    pub student_email: String,
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub course_id: i64,
    pub student_id: i64,
}

/// POST /teacher/courses/{course_id}/enroll
///
/// Enrolls a student, looked up by email, into one of the teacher's courses.
/// Enrolling an already-enrolled student returns `200 OK` instead of `201`.
///
/// ### Error Responses
/// - `404 Not Found`: foreign course, or no student account with that email.
pub async fn enroll_student(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<i64>,
    Json(req): Json<EnrollRequest>,
) -> impl IntoResponse {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(format_validation_errors(&errors))),
        )
            .into_response();
    }

    let db = app_state.db();

    match owned_course(db, course_id, user.0.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Course not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "enroll student: course lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to enroll student")),
            )
                .into_response();
        }
    }

    let student = match user::Model::find_by_email(db, &req.student_email).await {
        Ok(Some(student)) if student.role == UserRole::Student => student,
        Ok(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Student not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "enroll student: user lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to enroll student")),
            )
                .into_response();
        }
    };

    let model = enrollment::ActiveModel {
        course_id: Set(course_id),
        student_id: Set(student.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    match model.insert(db).await {
        Ok(enrollment) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                EnrollResponse {
                    course_id: enrollment.course_id,
                    student_id: enrollment.student_id,
                },
                "Student enrolled successfully",
            )),
        )
            .into_response(),
        Err(e) if e.to_string().contains("UNIQUE constraint failed: enrollments") => (
            StatusCode::OK,
            Json(ApiResponse::success(
                EnrollResponse {
                    course_id,
                    student_id: student.id,
                },
                "Student already enrolled",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "enroll student: insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to enroll student")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeScheduledResponse {
    pub submission_id: i64,
    pub status: String,
}

/// POST /teacher/activities/{activity_id}/students/{student_id}/analyze
///
/// Schedules an AI-reliance analysis of the student's graded submission and
/// returns immediately with `202 Accepted`. Re-requesting while a previous
/// run is still live does not restart it.
///
/// ### Error Responses
/// - `404 Not Found`: foreign activity, or no submission for this student.
/// - `409 Conflict`: the submission has not been graded yet.
pub async fn analyze_student(
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
            tracing::error!(error = %e, "analyze: activity lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to schedule analysis")),
            )
                .into_response();
        }
    }

    let submission =
        match submission::Model::find_by_activity_and_student(db, activity_id, student_id).await {
            Ok(Some(submission)) => submission,
            Ok(None) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::<()>::error(
                        "No submission found for this student",
                    )),
                )
                    .into_response();
            }
            Err(e) => {
                tracing::error!(error = %e, "analyze: submission lookup failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error("Failed to schedule analysis")),
                )
                    .into_response();
            }
        };

    if submission.status != SubmissionStatus::Graded {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error(
                "Submission has not been graded yet",
            )),
        )
            .into_response();
    }

    match enqueue_risk_analysis(&app_state, &submission).await {
        Ok(scheduled) => {
            let message = if scheduled {
                "Risk analysis scheduled"
            } else {
                "Risk analysis already in progress"
            };
            (
                StatusCode::ACCEPTED,
                Json(ApiResponse::success(
                    AnalyzeScheduledResponse {
                        submission_id: submission.id,
                        status: "pending".to_string(),
                    },
                    message,
                )),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "analyze: enqueue failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("Failed to schedule analysis")),
            )
                .into_response()
        }
    }
}
