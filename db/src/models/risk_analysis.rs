use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};

/// Tri-state lifecycle of an analysis. A row is written as `Pending` the
/// moment the analyzer is enqueued, so callers can always distinguish "still
/// computing" from "never requested" and from "failed".
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "analysis_status_enum")]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl Default for AnalysisStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Ready => "ready",
            AnalysisStatus::Failed => "failed",
        };
        write!(f, "{}", status_str)
    }
}

/// Ordered risk scale. Declaration order gives `LOW < MEDIUM < HIGH <
/// CRITICAL` through the derived `Ord`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "risk_level_enum")]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level_str = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        write!(f, "{}", level_str)
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            other => Err(format!("Unknown risk level: {}", other)),
        }
    }
}

impl RiskLevel {
    /// HIGH and CRITICAL students count into the at-risk analytics fold.
    pub fn is_at_risk(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

/// Derived AI-reliance diagnostic for one submission, recomputed wholesale.
///
/// The payload columns are only populated once `status` is `Ready`;
/// `error_message` only once `Failed`. `evidence` and `positive_aspects` are
/// JSON-encoded string lists.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "risk_analyses")]
pub struct Model {
    /// Primary key of the analysis.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the analyzed submission (unique, latest supersedes prior).
    pub submission_id: i64,
    /// Tri-state lifecycle.
    pub status: AnalysisStatus,
    /// Risk score 0-100.
    pub risk_score: Option<i32>,
    /// Classified risk level.
    pub risk_level: Option<RiskLevel>,
    /// Free-text diagnosis referencing observed chat behavior.
    pub diagnosis: Option<String>,
    /// JSON list of verbatim chat/code evidence.
    pub evidence: Option<String>,
    /// Suggested teacher intervention.
    pub teacher_advice: Option<String>,
    /// JSON list of observed strengths.
    pub positive_aspects: Option<String>,
    /// Populated when the analyzer failed.
    pub error_message: Option<String>,
    /// When the analyzer finished.
    pub analyzed_at: Option<DateTime<Utc>>,
    /// Timestamp when the analysis row was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the analysis row was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the analyzed submission.
    #[sea_orm(
        belongs_to = "super::submission::Entity",
        from = "Column::SubmissionId",
        to = "super::submission::Column::Id"
    )]
    Submission,
}

impl Related<super::submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find_by_submission(
        db: &DatabaseConnection,
        submission_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::SubmissionId.eq(submission_id))
            .one(db)
            .await
    }
}
