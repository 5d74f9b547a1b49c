use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Represents a course in the `courses` table.
///
/// Courses scope activities and student enrollment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    /// Primary key of the course.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable course title.
    pub title: String,
    /// Unique course code, e.g. `PROG1`.
    pub code: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// ID of the teacher who owns the course.
    pub teacher_id: i64,
    /// Timestamp when the course was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the course was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the owning teacher.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TeacherId",
        to = "super::user::Column::Id"
    )]
    Teacher,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
