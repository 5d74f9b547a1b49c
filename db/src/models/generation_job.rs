use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a generation job.
///
/// Transitions are monotonic: a job never leaves `Completed`, `Error` or
/// `Cancelled`, and never returns to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "job_status_enum")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Worker is generating draft exercises.
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Drafts are ready; waiting for the teacher to approve or cancel.
    #[sea_orm(string_value = "awaiting_approval")]
    AwaitingApproval,
    /// Teacher approved; the backing activity is published.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Generation failed; `error_message` has the reason.
    #[sea_orm(string_value = "error")]
    Error,
    /// Teacher abandoned the job.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Processing
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            JobStatus::Processing => "processing",
            JobStatus::AwaitingApproval => "awaiting_approval",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", status_str)
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Processing => matches!(
                next,
                JobStatus::AwaitingApproval | JobStatus::Error | JobStatus::Cancelled
            ),
            JobStatus::AwaitingApproval => {
                matches!(next, JobStatus::Completed | JobStatus::Cancelled)
            }
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled => false,
        }
    }
}

/// One asynchronous document-to-exercises pipeline run, owned by the teacher
/// who started it and bound to the backing draft activity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "generation_jobs")]
pub struct Model {
    /// Primary key of the job.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the teacher who started the job.
    pub teacher_id: i64,
    /// ID of the backing draft activity.
    pub activity_id: i64,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Topic the exercises are generated about.
    pub topic: String,
    /// Requested difficulty label.
    pub difficulty: String,
    /// Requested programming language.
    pub language: String,
    /// Number of draft exercises produced, set when drafts are ready.
    pub exercise_count: Option<i32>,
    /// Human-readable failure reason, set on `Error`.
    pub error_message: Option<String>,
    /// Timestamp when the job was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the job was last updated.
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

    /// Link to the backing activity.
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
