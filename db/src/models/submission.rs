use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};

/// Grading lifecycle of a submission.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "submission_status_enum")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Progress saved; not yet graded.
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    /// Final submission recorded and audited. Immutable from here.
    #[sea_orm(string_value = "graded")]
    Graded,
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::InProgress
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Graded => "graded",
        };
        write!(f, "{}", status_str)
    }
}

/// One grading attempt per session, holding the per-exercise attempts.
///
/// The per-exercise grades on the attempts are the authoritative record; the
/// activity-level grade is derived from them at read time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    /// Primary key of the submission.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the owning session (unique, one submission per session).
    pub session_id: i64,
    /// ID of the submitting student.
    pub student_id: i64,
    /// ID of the activity being submitted.
    pub activity_id: i64,
    /// Grading lifecycle state.
    pub status: SubmissionStatus,
    /// Overall feedback from the grading audit.
    pub general_feedback: Option<String>,
    /// Set when the final submission was recorded.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Timestamp when the submission was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the submission was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the owning session.
    #[sea_orm(
        belongs_to = "super::tutoring_session::Entity",
        from = "Column::SessionId",
        to = "super::tutoring_session::Column::Id"
    )]
    Session,

    /// Link to the submitting student.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id"
    )]
    Student,

    /// Link to the activity.
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
}

impl Related<super::tutoring_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find_by_session(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .one(db)
            .await
    }

    pub async fn find_by_activity_and_student(
        db: &DatabaseConnection,
        activity_id: i64,
        student_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::ActivityId.eq(activity_id))
            .filter(Column::StudentId.eq(student_id))
            .one(db)
            .await
    }
}
