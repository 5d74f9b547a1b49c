pub mod activity;
pub mod activity_document;
pub mod chat_message;
pub mod course;
pub mod enrollment;
pub mod exercise;
pub mod exercise_attempt;
pub mod generation_job;
pub mod risk_analysis;
pub mod submission;
pub mod tutoring_session;
pub mod user;
