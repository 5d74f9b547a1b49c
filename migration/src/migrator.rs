use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202603010001_create_users::Migration),
            Box::new(migrations::m202603010002_create_courses::Migration),
            Box::new(migrations::m202603010003_create_enrollments::Migration),
            Box::new(migrations::m202603010004_create_activities::Migration),
            Box::new(migrations::m202603010005_create_exercises::Migration),
            Box::new(migrations::m202603010006_create_activity_documents::Migration),
            Box::new(migrations::m202603010007_create_tutoring_sessions::Migration),
            Box::new(migrations::m202603010008_create_chat_messages::Migration),
            Box::new(migrations::m202603010009_create_submissions::Migration),
            Box::new(migrations::m202603010010_create_exercise_attempts::Migration),
            Box::new(migrations::m202603010011_create_risk_analyses::Migration),
            Box::new(migrations::m202603010012_create_generation_jobs::Migration),
        ]
    }
}
