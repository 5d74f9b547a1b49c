use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

/// Who produced a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "chat_role_enum")]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "tutor")]
    Tutor,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role_str = match self {
            ChatRole::Student => "student",
            ChatRole::Tutor => "tutor",
        };
        write!(f, "{}", role_str)
    }
}

/// One append-only turn within a tutoring session.
///
/// Turns are never mutated or deleted; ordering within a session is by
/// (created_at, id) so same-timestamp rows keep insertion order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tutoring_session::Entity",
        from = "Column::SessionId",
        to = "super::tutoring_session::Column::Id"
    )]
    Session,
}

impl Related<super::tutoring_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Full history of a session in send order.
    pub async fn history(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
