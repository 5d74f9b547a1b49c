#![allow(dead_code)]

pub mod fakes;

pub use fakes::{
    DownTutor, FailingGenerator, FailingRisk, FixedGenerator, FixedRisk, FixedTutor,
    ScriptedAuditor, StalledGenerator, StalledRisk, draft, fake_stack, graded_stack,
    high_risk_report, low_risk_report,
};

use ai::AiStack;
use api::routes::routes;
use api::state::AppState;
use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::Response,
};
use chrono::Utc;
use db::models::{
    activity::{self, ActivityStatus, ActivityType},
    course, enrollment, exercise,
    user::{self, UserRole},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::{Value, json};
use tower::ServiceExt;
use util::config::AppConfig;

/// Required configuration for every integration test. Tests are `#[serial]`
/// so the process-wide env mutation stays single-threaded.
pub fn setup_env() {
    unsafe {
        std::env::set_var("DATABASE_PATH", "data/test.db");
        std::env::set_var(
            "STORAGE_ROOT",
            std::env::temp_dir().join("tutoria-test-storage"),
        );
        std::env::set_var("JWT_SECRET", "integration-test-secret");
    }
    AppConfig::reset();
}

pub fn make_app(db: DatabaseConnection, ai: AiStack) -> Router {
    Router::new().nest("/api", routes(AppState::new(db, ai)))
}

pub async fn get_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// `Authorization` header value for a seeded user.
pub fn bearer(user: &user::Model) -> String {
    let pair = api::auth::generate_token_pair(user.id, &user.role.to_string());
    format!("Bearer {}", pair.access_token)
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, payload: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(AUTHORIZATION, auth);
    }
    builder
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

/// POST with no body, for endpoints where the body is optional or absent.
pub fn post_request(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

pub fn form_request(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

/// Multipart request with a single `file` field.
pub fn multipart_request(uri: &str, auth: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "integration-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header(AUTHORIZATION, auth)
        .body(Body::from(body))
        .unwrap()
}

pub async fn seed_teacher(db: &DatabaseConnection) -> user::Model {
    seed_teacher_with(db, "teacher@example.com", "Test Teacher").await
}

pub async fn seed_teacher_with(db: &DatabaseConnection, email: &str, name: &str) -> user::Model {
    user::Model::create(db, email, "password123", name, UserRole::Teacher)
        .await
        .expect("Failed to create teacher")
}

pub async fn seed_student(db: &DatabaseConnection) -> user::Model {
    seed_student_with(db, "student@example.com", "Student One").await
}

pub async fn seed_student_with(db: &DatabaseConnection, email: &str, name: &str) -> user::Model {
    user::Model::create(db, email, "password123", name, UserRole::Student)
        .await
        .expect("Failed to create student")
}

pub async fn seed_course(db: &DatabaseConnection, teacher_id: i64) -> course::Model {
    seed_course_with(db, teacher_id, "PY101").await
}

pub async fn seed_course_with(
    db: &DatabaseConnection,
    teacher_id: i64,
    code: &str,
) -> course::Model {
    course::ActiveModel {
        title: Set("Intro to Python".to_string()),
        code: Set(code.to_string()),
        description: Set(None),
        teacher_id: Set(teacher_id),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create course")
}

pub async fn enroll(db: &DatabaseConnection, course_id: i64, student_id: i64) {
    enrollment::ActiveModel {
        course_id: Set(course_id),
        student_id: Set(student_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to enroll student");
}

pub async fn seed_activity(
    db: &DatabaseConnection,
    course_id: i64,
    created_by: i64,
    status: ActivityStatus,
) -> activity::Model {
    activity::ActiveModel {
        course_id: Set(course_id),
        title: Set("Loops and Functions".to_string()),
        description: Set("Practice the basics".to_string()),
        activity_type: Set(ActivityType::Coding),
        status: Set(status),
        created_by: Set(created_by),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create activity")
}

pub async fn seed_exercise(
    db: &DatabaseConnection,
    activity_id: i64,
    order_index: i32,
) -> exercise::Model {
    exercise::ActiveModel {
        activity_id: Set(activity_id),
        title: Set(format!("Exercise {}", order_index + 1)),
        problem_statement: Set("Write a function that returns the answer.".to_string()),
        starter_code: Set("def solve():\n    pass".to_string()),
        solution_code: Set("def solve():\n    return 42".to_string()),
        language: Set("python".to_string()),
        difficulty: Set("easy".to_string()),
        order_index: Set(order_index),
        test_cases: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create exercise")
}

/// Opens a tutoring session on the activity and returns the new session id.
pub async fn open_session(app: &Router, auth: &str, activity_id: i64) -> i64 {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/student/sessions",
            Some(auth),
            &json!({ "activity_id": activity_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    get_json_body(response).await["data"]["session_id"]
        .as_i64()
        .unwrap()
}

/// Final submission carrying code for both classroom exercises.
pub async fn final_submit(
    app: &Router,
    auth: &str,
    session_id: i64,
    exercises: &[exercise::Model],
) -> Response {
    let payload = json!({
        "exercise_id": exercises[0].id,
        "code": "def solve():\n    return 42",
        "is_final_submission": true,
        "all_exercise_codes": {
            (exercises[0].id.to_string()): "def solve():\n    return 42",
            (exercises[1].id.to_string()): "def solve():\n    return 40 + 2",
        }
    });
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/student/sessions/{session_id}/submit"),
            Some(auth),
            &payload,
        ))
        .await
        .unwrap()
}

/// Everything needed to walk the student flow end to end.
pub struct Classroom {
    pub teacher: user::Model,
    pub student: user::Model,
    pub course: course::Model,
    pub activity: activity::Model,
    pub exercises: Vec<exercise::Model>,
}

/// One teacher, one enrolled student and a published activity with two
/// exercises. The common starting point for session and grading tests.
pub async fn seed_classroom(db: &DatabaseConnection) -> Classroom {
    let teacher = seed_teacher(db).await;
    let student = seed_student(db).await;
    let course = seed_course(db, teacher.id).await;
    enroll(db, course.id, student.id).await;
    let activity = seed_activity(db, course.id, teacher.id, ActivityStatus::Published).await;
    let exercises = vec![
        seed_exercise(db, activity.id, 0).await,
        seed_exercise(db, activity.id, 1).await,
    ];
    Classroom {
        teacher,
        student,
        course,
        activity,
        exercises,
    }
}

/// Inserts an already-extracted document row, skipping upload and disk.
pub async fn seed_document(db: &DatabaseConnection, activity_id: i64) {
    db::models::activity_document::ActiveModel {
        activity_id: Set(activity_id),
        filename: Set("lecture.pdf".to_string()),
        path: Set(format!("activity_{activity_id}/documents/1.pdf")),
        content_text: Set("Loops repeat a block until a condition fails.".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create document");
}
