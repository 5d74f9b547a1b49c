mod helpers;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{Router, http::StatusCode};
    use db::models::activity::ActivityStatus;
    use db::test_utils::setup_test_db;
    use serde_json::{Value, json};
    use serial_test::serial;
    use tower::ServiceExt;

    use crate::helpers::{
        FailingGenerator, StalledGenerator, bearer, fake_stack, get_json_body, get_request,
        json_request, make_app, multipart_request, post_request, seed_activity, seed_course,
        seed_document, seed_teacher, seed_teacher_with, setup_env,
    };

    /// Polls the job until it leaves `processing` and returns the last body.
    async fn wait_for_job(app: &Router, auth: &str, job_id: i64) -> Value {
        let uri = format!("/api/learning/jobs/{job_id}");
        for _ in 0..100 {
            let response = app
                .clone()
                .oneshot(get_request(&uri, Some(auth)))
                .await
                .unwrap();
            let json = get_json_body(response).await;
            if json["data"]["status"] != "processing" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("generation job {job_id} never left processing");
    }

    /// Starts generation on the activity and returns the new job id.
    async fn start_generation(app: &Router, auth: &str, activity_id: i64) -> i64 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/learning/generate",
                Some(auth),
                &json!({
                    "activity_id": activity_id,
                    "topic": "Arrays",
                    "difficulty": "easy",
                    "language": "python",
                    "count": 2
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Generation started");
        assert_eq!(json["data"]["status"], "processing");
        json["data"]["job_id"].as_i64().unwrap()
    }

    /// Test Case: Uploading with an empty payload
    #[tokio::test]
    #[serial]
    async fn test_upload_rejects_missing_file() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let response = app
            .oneshot(multipart_request(
                &format!("/api/learning/activities/{}/document", activity.id),
                &auth,
                "notes.pdf",
                b"",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "No file provided");
    }

    /// Test Case: Only PDF uploads are accepted
    #[tokio::test]
    #[serial]
    async fn test_upload_rejects_non_pdf() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);
        let uri = format!("/api/learning/activities/{}/document", activity.id);

        // Wrong extension.
        let response = app
            .clone()
            .oneshot(multipart_request(&uri, &auth, "notes.txt", b"plain text"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Only PDF documents are accepted");

        // Right extension, wrong content.
        let response = app
            .oneshot(multipart_request(&uri, &auth, "fake.pdf", b"not a pdf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Only PDF documents are accepted");
    }

    /// Test Case: A PDF header with an unreadable body is rejected
    #[tokio::test]
    #[serial]
    async fn test_upload_rejects_unreadable_pdf() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let response = app
            .oneshot(multipart_request(
                &format!("/api/learning/activities/{}/document", activity.id),
                &auth,
                "lecture.pdf",
                b"%PDF-1.4 truncated beyond repair",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Could not extract text from the PDF document");
    }

    /// Test Case: Uploading to a foreign or unknown activity
    #[tokio::test]
    #[serial]
    async fn test_upload_unknown_activity() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let response = app
            .oneshot(multipart_request(
                "/api/learning/activities/999/document",
                &auth,
                "lecture.pdf",
                b"%PDF-1.4",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Activity not found");
    }

    /// Test Case: Generation count bounds are validated up front
    #[tokio::test]
    #[serial]
    async fn test_generate_validates_count() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        seed_document(&db, activity.id).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/learning/generate",
                Some(&auth),
                &json!({
                    "activity_id": activity.id,
                    "topic": "Arrays",
                    "difficulty": "easy",
                    "language": "python",
                    "count": 0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Count must be between 1 and 20");
    }

    /// Test Case: Generation only runs against draft activities
    #[tokio::test]
    #[serial]
    async fn test_generate_requires_draft_activity() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Published).await;
        seed_document(&db, activity.id).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/learning/generate",
                Some(&auth),
                &json!({
                    "activity_id": activity.id,
                    "topic": "Arrays",
                    "difficulty": "easy",
                    "language": "python",
                    "count": 2
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let json = get_json_body(response).await;
        assert_eq!(
            json["message"],
            "Exercises can only be generated for draft activities"
        );
    }

    /// Test Case: Generation needs an uploaded document to draw from
    #[tokio::test]
    #[serial]
    async fn test_generate_requires_document() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/learning/generate",
                Some(&auth),
                &json!({
                    "activity_id": activity.id,
                    "topic": "Arrays",
                    "difficulty": "easy",
                    "language": "python",
                    "count": 2
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = get_json_body(response).await;
        assert_eq!(
            json["message"],
            "Upload a PDF document for this activity first"
        );
    }

    /// Test Case: Generate, review the draft, publish, publish again
    #[tokio::test]
    #[serial]
    async fn test_generation_flow_to_publish() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        seed_document(&db, activity.id).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let job_id = start_generation(&app, &auth, activity.id).await;

        let job = wait_for_job(&app, &auth, job_id).await;
        assert_eq!(job["message"], "Job status retrieved successfully");
        assert_eq!(job["data"]["status"], "awaiting_approval");
        assert_eq!(job["data"]["activity_id"], activity.id);
        assert_eq!(job["data"]["topic"], "Arrays");
        assert_eq!(job["data"]["exercise_count"], 2);
        assert!(job["data"]["error_message"].is_null());

        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/api/learning/jobs/{job_id}/draft"),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Draft retrieved successfully");
        let drafts = json["data"]["exercises"].as_array().unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0]["title"], "Two Sum");
        assert_eq!(drafts[0]["order_index"], 0);
        assert!(drafts[0]["solution_code"].as_str().is_some());
        assert_eq!(drafts[0]["test_cases"][0]["expected_output"], "42");
        assert_eq!(drafts[1]["title"], "Reverse A String");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/learning/jobs/{job_id}/publish"),
                Some(&auth),
                &json!({ "activity_title": "Arrays Practice" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Exercises published successfully");
        assert_eq!(json["data"]["exercise_count"], 2);
        assert_eq!(json["data"]["status"], "completed");

        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/api/teacher/activities/{}", activity.id),
                Some(&auth),
            ))
            .await
            .unwrap();
        let json = get_json_body(response).await;
        assert_eq!(json["data"]["title"], "Arrays Practice");
        assert_eq!(json["data"]["status"], "published");
        assert_eq!(json["data"]["exercises"].as_array().unwrap().len(), 2);

        // Publishing a completed job changes nothing and reports the same count.
        let response = app
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/publish"),
                &auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["data"]["exercise_count"], 2);
        assert_eq!(json["data"]["status"], "completed");
    }

    /// Test Case: Focus concepts are folded into the stored topic
    #[tokio::test]
    #[serial]
    async fn test_generate_folds_concepts_into_topic() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        seed_document(&db, activity.id).await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/learning/generate",
                Some(&auth),
                &json!({
                    "activity_id": activity.id,
                    "topic": "Arrays",
                    "difficulty": "easy",
                    "language": "python",
                    "count": 2,
                    "concepts": ["lists", "loops"]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let job_id = get_json_body(response).await["data"]["job_id"]
            .as_i64()
            .unwrap();

        let job = wait_for_job(&app, &auth, job_id).await;
        assert_eq!(job["data"]["topic"], "Arrays (focus concepts: lists, loops)");
    }

    /// Test Case: A failed generation parks the job in error with a reason
    #[tokio::test]
    #[serial]
    async fn test_generation_failure_parks_job_in_error() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        seed_document(&db, activity.id).await;
        let mut stack = fake_stack();
        stack.generator = Arc::new(FailingGenerator("unparseable model output"));
        let app = make_app(db.clone(), stack);
        let auth = bearer(&teacher);

        let job_id = start_generation(&app, &auth, activity.id).await;

        let job = wait_for_job(&app, &auth, job_id).await;
        assert_eq!(job["data"]["status"], "error");
        assert!(job["data"]["exercise_count"].is_null());
        let message = job["data"]["error_message"].as_str().unwrap();
        assert!(message.contains("could not parse model output"));

        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/api/learning/jobs/{job_id}/draft"),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = get_json_body(response).await;
        assert_eq!(
            json["message"],
            "Generation failed; there is no draft to review"
        );

        let response = app
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/publish"),
                &auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = get_json_body(response).await;
        assert_eq!(
            json["message"],
            "Generation failed; there is no draft to publish"
        );
    }

    /// Test Case: An in-flight job can be cancelled exactly once
    #[tokio::test]
    #[serial]
    async fn test_cancel_inflight_job() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        seed_document(&db, activity.id).await;
        let mut stack = fake_stack();
        stack.generator = Arc::new(StalledGenerator);
        let app = make_app(db.clone(), stack);
        let auth = bearer(&teacher);

        let job_id = start_generation(&app, &auth, activity.id).await;

        // Still processing: no draft, no publish.
        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/api/learning/jobs/{job_id}/draft"),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Exercises are not ready yet");

        let response = app
            .clone()
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/publish"),
                &auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/cancel"),
                &auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Generation job cancelled");
        assert_eq!(json["data"]["status"], "cancelled");

        let job = wait_for_job(&app, &auth, job_id).await;
        assert_eq!(job["data"]["status"], "cancelled");

        let response = app
            .clone()
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/cancel"),
                &auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Job already finished");

        let response = app
            .clone()
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/publish"),
                &auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Job was cancelled");

        let response = app
            .oneshot(get_request(
                &format!("/api/learning/jobs/{job_id}/draft"),
                Some(&auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Job was cancelled");
    }

    /// Test Case: Jobs are invisible to other teachers
    #[tokio::test]
    #[serial]
    async fn test_jobs_are_private() {
        setup_env();
        let db = setup_test_db().await;
        let teacher = seed_teacher(&db).await;
        let course = seed_course(&db, teacher.id).await;
        let activity = seed_activity(&db, course.id, teacher.id, ActivityStatus::Draft).await;
        seed_document(&db, activity.id).await;
        let other = seed_teacher_with(&db, "other.teacher@example.com", "Other Teacher").await;
        let app = make_app(db.clone(), fake_stack());
        let auth = bearer(&teacher);

        let job_id = start_generation(&app, &auth, activity.id).await;

        let other_auth = bearer(&other);
        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/api/learning/jobs/{job_id}"),
                Some(&other_auth),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = get_json_body(response).await;
        assert_eq!(json["message"], "Job not found");

        let response = app
            .clone()
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/publish"),
                &other_auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(post_request(
                &format!("/api/learning/jobs/{job_id}/cancel"),
                &other_auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
