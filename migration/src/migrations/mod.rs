pub mod m202603010001_create_users;
pub mod m202603010002_create_courses;
pub mod m202603010003_create_enrollments;
pub mod m202603010004_create_activities;
pub mod m202603010005_create_exercises;
pub mod m202603010006_create_activity_documents;
pub mod m202603010007_create_tutoring_sessions;
pub mod m202603010008_create_chat_messages;
pub mod m202603010009_create_submissions;
pub mod m202603010010_create_exercise_attempts;
pub mod m202603010011_create_risk_analyses;
pub mod m202603010012_create_generation_jobs;
