mod helpers;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use ai::AiStack;
    use axum::http::StatusCode;
    use db::models::activity::{self, ActivityStatus};
    use db::test_utils::setup_test_db;
    use sea_orm::{ActiveModelTrait, Set};
    use serde_json::json;
    use serial_test::serial;
    use tower::ServiceExt;

    use crate::helpers::{
        Classroom, DownTutor, ScriptedAuditor, bearer, fake_stack, final_submit, get_json_body,
        get_request, graded_stack, json_request, make_app, open_session, seed_activity,
        seed_classroom, seed_student_with, setup_env,
    };

    /// Auditor scripted to grade the two classroom exercises 90 and 80.
    fn classroom_stack(classroom: &Classroom) -> AiStack {
        graded_stack(classroom.exercises[0].id, classroom.exercises[1].id)
    }

    /// Test Case: Starting a session on an unknown activity
    #[tokio::test]
    #[serial]
    async fn test_start_session_unknown_activity() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/student/sessions",
                Some(&auth),
                &json!({ "activity_id": 999 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = get_json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Activity not found");
    }

    /// Test Case: Draft activities cannot be started even when enrolled
    #[tokio::test]
    #[serial]
    async fn test_start_session_requires_published_activity() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let draft = seed_activity(
            &db,
            classroom.course.id,
            classroom.teacher.id,
            ActivityStatus::Draft,
        )
        .await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/student/sessions",
                Some(&auth),
                &json!({ "activity_id": draft.id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Activity not found");
    }

    /// Test Case: A student outside the course cannot start a session
    #[tokio::test]
    #[serial]
    async fn test_start_session_requires_enrollment() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let outsider = seed_student_with(&db, "outsider@example.com", "Outsider").await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&outsider);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/student/sessions",
                Some(&auth),
                &json!({ "activity_id": classroom.activity.id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Activity not found");
    }

    /// Test Case: Starting twice resumes the active session instead of forking
    #[tokio::test]
    #[serial]
    async fn test_start_session_then_resume() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);
        let payload = json!({ "activity_id": classroom.activity.id, "mode": "socratic" });

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/student/sessions",
                Some(&auth),
                &payload,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = get_json_body(response).await;
        assert_eq!(created["message"], "Session started");
        assert_eq!(created["data"]["mode"], "socratic");
        assert_eq!(created["data"]["status"], "active");
        let session_id = created["data"]["session_id"].as_i64().unwrap();

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/student/sessions",
                Some(&auth),
                &payload,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let resumed = get_json_body(response).await;
        assert_eq!(resumed["message"], "Session resumed");
        assert_eq!(resumed["data"]["session_id"], session_id);
    }

    /// Test Case: Chat returns the tutor reply and both turns land in order
    #[tokio::test]
    #[serial]
    async fn test_chat_returns_reply_and_orders_history() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/student/sessions/{session_id}/chat"),
                Some(&auth),
                &json!({ "message": "Why is my loop infinite?", "code_context": "while i < n:" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Message sent");
        assert_eq!(
            json["data"]["content"],
            "Think about what the loop condition does."
        );

        let response = app
            .oneshot(get_request(
                &format!("/api/student/sessions/{session_id}"),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["data"]["status"], "active");
        let messages = json["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "student");
        assert_eq!(messages[0]["content"], "Why is my loop infinite?");
        assert_eq!(messages[1]["role"], "tutor");
        assert_eq!(
            messages[1]["content"],
            "Think about what the loop condition does."
        );
    }

    /// Test Case: An empty chat message is rejected
    #[tokio::test]
    #[serial]
    async fn test_chat_rejects_empty_message() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/student/sessions/{session_id}/chat"),
                Some(&auth),
                &json!({ "message": "" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Message must not be empty");
    }

    /// Test Case: The student turn survives a tutor outage
    #[tokio::test]
    #[serial]
    async fn test_chat_keeps_student_turn_when_tutor_down() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let mut stack = fake_stack();
        stack.tutor = Arc::new(DownTutor);
        let app = make_app(db.clone(), stack);
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/student/sessions/{session_id}/chat"),
                Some(&auth),
                &json!({ "message": "Is recursion always slower?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = get_json_body(response).await;
        assert_eq!(
            json["message"],
            "The tutor is unavailable right now. Your message was saved, please try again."
        );

        let response = app
            .oneshot(get_request(
                &format!("/api/student/sessions/{session_id}"),
                Some(&auth),
            ))
            .await
            .unwrap();
        let json = get_json_body(response).await;
        let messages = json["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "student");
        assert_eq!(messages[0]["content"], "Is recursion always slower?");
    }

    /// Test Case: Another student's session is indistinguishable from a missing one
    #[tokio::test]
    #[serial]
    async fn test_chat_foreign_session_hidden() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let outsider = seed_student_with(&db, "outsider@example.com", "Outsider").await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let outsider_auth = bearer(&outsider);
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/student/sessions/{session_id}/chat"),
                Some(&outsider_auth),
                &json!({ "message": "hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Session not found");

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/student/sessions/999/chat",
                Some(&auth),
                &json!({ "message": "hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// Test Case: A non-final submit saves progress without grading anything
    #[tokio::test]
    #[serial]
    async fn test_submit_progress_is_not_graded() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/student/sessions/{session_id}/submit"),
                Some(&auth),
                &json!({
                    "exercise_id": classroom.exercises[0].id,
                    "code": "def solve():\n    pass"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Progress saved");
        assert_eq!(json["data"]["status"], "in_progress");
        assert!(json["data"]["submission_id"].as_i64().is_some());

        let response = app
            .clone()
            .oneshot(get_request(
                &format!(
                    "/api/student/activities/{}/results",
                    classroom.activity.id
                ),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(get_request(
                &format!("/api/student/sessions/{session_id}"),
                Some(&auth),
            ))
            .await
            .unwrap();
        let json = get_json_body(response).await;
        assert_eq!(json["data"]["status"], "active");
    }

    /// Test Case: Submitting code for an exercise outside the activity
    #[tokio::test]
    #[serial]
    async fn test_submit_unknown_exercise() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/student/sessions/{session_id}/submit"),
                Some(&auth),
                &json!({ "exercise_id": 999, "code": "print(1)" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Exercise not found");
    }

    /// Test Case: The final submit grades every exercise and closes the session
    #[tokio::test]
    #[serial]
    async fn test_final_submit_grades_every_exercise() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), classroom_stack(&classroom));
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let response = final_submit(&app, &auth, session_id, &classroom.exercises).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Submission graded");
        assert_eq!(json["data"]["grade"], 85.0);
        assert_eq!(json["data"]["passed"], true);
        assert_eq!(json["data"]["feedback"], "Solid work");

        let audit = json["data"]["details"]["exercises_audit"].as_array().unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[0]["exercise_id"], classroom.exercises[0].id);
        assert_eq!(audit[0]["grade"], 90);
        assert_eq!(audit[0]["passed"], true);
        assert_eq!(audit[0]["feedback"], "Feedback for Exercise 1");
        assert_eq!(audit[1]["grade"], 80);
        assert_eq!(audit[1]["passed"], true);

        let response = app
            .oneshot(get_request(
                &format!("/api/student/sessions/{session_id}"),
                Some(&auth),
            ))
            .await
            .unwrap();
        let json = get_json_body(response).await;
        assert_eq!(json["data"]["status"], "submitted");
    }

    /// Test Case: Exercises the auditor skipped are graded zero
    #[tokio::test]
    #[serial]
    async fn test_missing_audit_entry_grades_zero() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let mut stack = fake_stack();
        stack.auditor = Arc::new(ScriptedAuditor {
            grades: HashMap::from([(classroom.exercises[0].id, 90)]),
            general_feedback: "Partial review",
        });
        let app = make_app(db.clone(), stack);
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;

        let response = final_submit(&app, &auth, session_id, &classroom.exercises).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["data"]["grade"], 45.0);
        assert_eq!(json["data"]["passed"], false);

        let audit = json["data"]["details"]["exercises_audit"].as_array().unwrap();
        assert_eq!(audit[1]["grade"], 0);
        assert_eq!(audit[1]["passed"], false);
        assert!(audit[1]["feedback"].is_null());
    }

    /// Test Case: Chatting on a submitted session is rejected
    #[tokio::test]
    #[serial]
    async fn test_chat_after_final_submit() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), classroom_stack(&classroom));
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;
        final_submit(&app, &auth, session_id, &classroom.exercises).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/student/sessions/{session_id}/chat"),
                Some(&auth),
                &json!({ "message": "One more question?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Session already submitted");
    }

    /// Test Case: A second final submit on the same session is rejected
    #[tokio::test]
    #[serial]
    async fn test_resubmit_same_session() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), classroom_stack(&classroom));
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;
        final_submit(&app, &auth, session_id, &classroom.exercises).await;

        let response = final_submit(&app, &auth, session_id, &classroom.exercises).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Activity already submitted");
    }

    /// Test Case: A fresh session cannot regrade an already graded activity
    #[tokio::test]
    #[serial]
    async fn test_new_session_cannot_regrade_activity() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), classroom_stack(&classroom));
        let auth = bearer(&classroom.student);
        let first_session = open_session(&app, &auth, classroom.activity.id).await;
        final_submit(&app, &auth, first_session, &classroom.exercises).await;

        // The submitted session is closed, so a new one is created.
        let second_session = open_session(&app, &auth, classroom.activity.id).await;
        assert_ne!(second_session, first_session);

        let response = final_submit(&app, &auth, second_session, &classroom.exercises).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Activity already submitted");
    }

    /// Test Case: Results are a conflict before grading and complete after
    #[tokio::test]
    #[serial]
    async fn test_results_ready_after_grading() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), classroom_stack(&classroom));
        let auth = bearer(&classroom.student);
        let results_uri = format!("/api/student/activities/{}/results", classroom.activity.id);

        let response = app
            .clone()
            .oneshot(get_request(&results_uri, Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = get_json_body(response).await;
        assert_eq!(
            json["message"],
            "No graded submission exists for this activity"
        );

        let session_id = open_session(&app, &auth, classroom.activity.id).await;
        final_submit(&app, &auth, session_id, &classroom.exercises).await;

        let response = app
            .oneshot(get_request(&results_uri, Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Results retrieved successfully");
        assert_eq!(json["data"]["activity_id"], classroom.activity.id);
        assert_eq!(json["data"]["grade"], 85.0);
        assert_eq!(json["data"]["passed"], true);
        assert_eq!(json["data"]["general_feedback"], "Solid work");
        assert!(json["data"]["submitted_at"].as_str().is_some());

        let exercises = json["data"]["exercises"].as_array().unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0]["title"], "Exercise 1");
        assert_eq!(exercises[0]["grade"], 90);
        assert_eq!(exercises[0]["passed"], true);
        assert_eq!(exercises[0]["feedback"], "Feedback for Exercise 1");
        assert_eq!(exercises[1]["grade"], 80);
    }

    /// Test Case: Results stay readable after the activity is archived
    #[tokio::test]
    #[serial]
    async fn test_results_survive_archiving() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), classroom_stack(&classroom));
        let auth = bearer(&classroom.student);
        let session_id = open_session(&app, &auth, classroom.activity.id).await;
        final_submit(&app, &auth, session_id, &classroom.exercises).await;

        let mut active: activity::ActiveModel = classroom.activity.clone().into();
        active.status = Set(ActivityStatus::Archived);
        active.update(&db).await.unwrap();

        // The archived activity drops out of the catalog...
        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/api/student/activities/{}", classroom.activity.id),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // ...but its graded results do not.
        let response = app
            .oneshot(get_request(
                &format!(
                    "/api/student/activities/{}/results",
                    classroom.activity.id
                ),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["data"]["grade"], 85.0);
    }

    /// Test Case: The grade listing shows the graded activity with its course
    #[tokio::test]
    #[serial]
    async fn test_grades_list_graded_activities() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let app = make_app(db.clone(), classroom_stack(&classroom));
        let auth = bearer(&classroom.student);

        let response = app
            .clone()
            .oneshot(get_request("/api/student/grades", Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 0);

        let session_id = open_session(&app, &auth, classroom.activity.id).await;
        final_submit(&app, &auth, session_id, &classroom.exercises).await;

        let response = app
            .oneshot(get_request("/api/student/grades", Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Grades retrieved successfully");
        let grades = json["data"].as_array().unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0]["activity_id"], classroom.activity.id);
        assert_eq!(grades[0]["activity_title"], "Loops and Functions");
        assert_eq!(grades[0]["course_title"], "Intro to Python");
        assert_eq!(grades[0]["grade"], 85.0);
        assert_eq!(grades[0]["passed"], true);
    }

    /// Test Case: The catalog shows only published activities in enrolled courses
    #[tokio::test]
    #[serial]
    async fn test_catalog_scoped_to_enrollment_and_status() {
        setup_env();
        let db = setup_test_db().await;
        let classroom = seed_classroom(&db).await;
        let draft = seed_activity(
            &db,
            classroom.course.id,
            classroom.teacher.id,
            ActivityStatus::Draft,
        )
        .await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&classroom.student);

        let response = app
            .clone()
            .oneshot(get_request("/api/student/courses", Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        let courses = json["data"].as_array().unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0]["title"], "Intro to Python");
        assert_eq!(courses[0]["code"], "PY101");

        let response = app
            .clone()
            .oneshot(get_request("/api/student/activities", Some(&auth)))
            .await
            .unwrap();
        let json = get_json_body(response).await;
        let activities = json["data"].as_array().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0]["id"], classroom.activity.id);
        assert_eq!(activities[0]["course_title"], "Intro to Python");

        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/api/student/activities/{}", draft.id),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(get_request(
                &format!("/api/student/activities/{}", classroom.activity.id),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        let exercises = json["data"]["exercises"].as_array().unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0]["title"], "Exercise 1");
        assert!(exercises[0]["starter_code"].as_str().is_some());
        // The reference solution must never reach a student.
        assert!(exercises[0].get("solution_code").is_none());
    }
}
