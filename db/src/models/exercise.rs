use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Represents one graded coding task in the `exercises` table.
///
/// `solution_code` is the AI-generated reference solution used by the grading
/// rubric; it is never sent to students.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "exercises")]
pub struct Model {
    /// Primary key of the exercise.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the containing activity.
    pub activity_id: i64,
    /// Exercise title.
    pub title: String,
    /// Full problem statement.
    pub problem_statement: String,
    /// Code the student starts from.
    pub starter_code: String,
    /// Reference solution for the grading rubric.
    #[serde(skip_serializing)]
    pub solution_code: String,
    /// Programming language, e.g. `python`.
    pub language: String,
    /// Difficulty label, e.g. `easy` / `medium` / `hard`.
    pub difficulty: String,
    /// Position within the activity, unique per activity.
    pub order_index: i32,
    /// Optional JSON-encoded test cases.
    pub test_cases: Option<String>,
    /// Timestamp when the exercise was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the exercise was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the containing activity.
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
