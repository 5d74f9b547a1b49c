use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};

/// How the tutor behaves within a session.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "session_mode_enum")]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Never gives code; answers with counter-questions.
    #[sea_orm(string_value = "socratic")]
    Socratic,
    /// Explains concepts directly, still without writing code.
    #[sea_orm(string_value = "direct")]
    Direct,
    /// Points at the next step only.
    #[sea_orm(string_value = "hint")]
    Hint,
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::Socratic
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode_str = match self {
            SessionMode::Socratic => "socratic",
            SessionMode::Direct => "direct",
            SessionMode::Hint => "hint",
        };
        write!(f, "{}", mode_str)
    }
}

/// Lifecycle of a session: `Active` until the final submission is recorded,
/// then `Submitted` for good.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "session_status_enum")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "submitted")]
    Submitted,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            SessionStatus::Active => "active",
            SessionStatus::Submitted => "submitted",
        };
        write!(f, "{}", status_str)
    }
}

/// A student's live working context on one activity.
///
/// At most one `Active` session exists per (student, activity); starting
/// again while active returns the existing session so chat history is never
/// orphaned.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tutoring_sessions")]
pub struct Model {
    /// Primary key of the session.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the owning student.
    pub student_id: i64,
    /// ID of the activity being worked on.
    pub activity_id: i64,
    /// Tutor behavior for this session.
    pub mode: SessionMode,
    /// Session lifecycle state.
    pub status: SessionStatus,
    /// Timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the session was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the owning student.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id"
    )]
    Student,

    /// Link to the activity being worked on.
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The student's currently active session on an activity, if any.
    pub async fn find_active(
        db: &DatabaseConnection,
        student_id: i64,
        activity_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::ActivityId.eq(activity_id))
            .filter(Column::Status.eq(SessionStatus::Active))
            .one(db)
            .await
    }
}
