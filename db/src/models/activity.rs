use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Publication state of an activity. Students only see `Published`.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "activity_status_enum")]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl Default for ActivityStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            ActivityStatus::Draft => "draft",
            ActivityStatus::Published => "published",
            ActivityStatus::Archived => "archived",
        };
        write!(f, "{}", status_str)
    }
}

impl std::str::FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ActivityStatus::Draft),
            "published" => Ok(ActivityStatus::Published),
            "archived" => Ok(ActivityStatus::Archived),
            other => Err(format!("Invalid status: {}", other)),
        }
    }
}

/// Kind of assignable work. Modules are reading material grouping other
/// activities and are published on creation; everything else starts as draft.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "activity_type_enum")]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    #[sea_orm(string_value = "practice")]
    Practice,
    #[sea_orm(string_value = "exam")]
    Exam,
    #[sea_orm(string_value = "tutorial")]
    Tutorial,
    #[sea_orm(string_value = "module")]
    Module,
    #[sea_orm(string_value = "coding")]
    Coding,
    #[sea_orm(string_value = "reading")]
    Reading,
}

impl Default for ActivityType {
    fn default() -> Self {
        Self::Practice
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let type_str = match self {
            ActivityType::Practice => "practice",
            ActivityType::Exam => "exam",
            ActivityType::Tutorial => "tutorial",
            ActivityType::Module => "module",
            ActivityType::Coding => "coding",
            ActivityType::Reading => "reading",
        };
        write!(f, "{}", type_str)
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "practice" => Ok(ActivityType::Practice),
            "exam" => Ok(ActivityType::Exam),
            "tutorial" => Ok(ActivityType::Tutorial),
            "module" => Ok(ActivityType::Module),
            "coding" => Ok(ActivityType::Coding),
            "reading" => Ok(ActivityType::Reading),
            other => Err(format!("Invalid activity type: {}", other)),
        }
    }
}

impl ActivityType {
    /// Modules skip the draft stage.
    pub fn initial_status(&self) -> ActivityStatus {
        match self {
            ActivityType::Module => ActivityStatus::Published,
            _ => ActivityStatus::Draft,
        }
    }
}

/// Represents an assignable unit of work in the `activities` table.
///
/// An activity belongs to a course and carries the exercises students work
/// through in a tutoring session.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    /// Primary key of the activity.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the course this activity belongs to.
    pub course_id: i64,
    /// Title shown in the catalog.
    pub title: String,
    /// Instructions for the student.
    pub description: String,
    /// Kind of activity.
    pub activity_type: ActivityType,
    /// Publication state.
    pub status: ActivityStatus,
    /// ID of the authoring teacher.
    pub created_by: i64,
    /// Timestamp when the activity was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the activity was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the containing course.
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,

    /// Link to the authoring teacher.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Author,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_are_published_on_creation() {
        assert_eq!(ActivityType::Module.initial_status(), ActivityStatus::Published);
        assert_eq!(ActivityType::Practice.initial_status(), ActivityStatus::Draft);
        assert_eq!(ActivityType::Exam.initial_status(), ActivityStatus::Draft);
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!("published".parse::<ActivityStatus>(), Ok(ActivityStatus::Published));
        assert_eq!("archived".parse::<ActivityStatus>(), Ok(ActivityStatus::Archived));
        assert!("retired".parse::<ActivityStatus>().is_err());
        assert!("PUBLISHED".parse::<ActivityStatus>().is_err());
    }

    #[test]
    fn type_parses_known_values_only() {
        assert_eq!("coding".parse::<ActivityType>(), Ok(ActivityType::Coding));
        assert_eq!("module".parse::<ActivityType>(), Ok(ActivityType::Module));
        assert!("quiz".parse::<ActivityType>().is_err());
    }
}
