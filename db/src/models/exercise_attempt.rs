use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// The latest code and grading outcome for one exercise within a submission.
///
/// Unique per (submission, exercise): non-final submits overwrite the code,
/// the final grading pass fills in grade, passed and feedback exactly once.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "exercise_attempts")]
pub struct Model {
    /// Primary key of the attempt.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the owning submission.
    pub submission_id: i64,
    /// ID of the attempted exercise.
    pub exercise_id: i64,
    /// The student's code as last submitted.
    pub code: String,
    /// Grade 0-100, set by the final grading pass.
    pub grade: Option<i32>,
    /// Whether the grade met the passing threshold.
    pub passed: Option<bool>,
    /// Per-exercise feedback from the grading audit.
    pub feedback: Option<String>,
    /// Timestamp when the attempt was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the attempt was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the owning submission.
    #[sea_orm(
        belongs_to = "super::submission::Entity",
        from = "Column::SubmissionId",
        to = "super::submission::Column::Id"
    )]
    Submission,

    /// Link to the attempted exercise.
    #[sea_orm(
        belongs_to = "super::exercise::Entity",
        from = "Column::ExerciseId",
        to = "super::exercise::Column::Id"
    )]
    Exercise,
}

impl Related<super::submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl Related<super::exercise::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Exercise.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
