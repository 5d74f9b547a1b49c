use std::{fs, path::PathBuf};

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use serde::Serialize;
use util::paths::{activity_documents_dir, ensure_dir, storage_root};

/// An uploaded source document for one activity.
///
/// `content_text` holds the extracted text and is concatenated into the
/// generation and tutoring prompts. `path` is relative to the storage root.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "activity_documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub activity_id: i64,
    pub filename: String,
    #[serde(skip_serializing)]
    pub path: String,
    #[serde(skip_serializing)]
    pub content_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
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

impl Model {
    /// Saves one uploaded document: inserts the row, writes the bytes under
    /// the activity's document directory as `{id}.{ext}` and records the
    /// path relative to the storage root.
    pub async fn save_document(
        db: &DatabaseConnection,
        activity_id: i64,
        filename: &str,
        bytes: &[u8],
        content_text: &str,
    ) -> Result<Model, DbErr> {
        let partial = ActiveModel {
            activity_id: Set(activity_id),
            filename: Set(filename.to_string()),
            path: Set("".to_string()),
            content_text: Set(content_text.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let inserted: Model = partial.insert(db).await?;

        let ext = PathBuf::from(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_string());
        let stored_filename = match ext {
            Some(ext) => format!("{}.{}", inserted.id, ext),
            None => inserted.id.to_string(),
        };

        let dir_path = activity_documents_dir(activity_id);
        ensure_dir(&dir_path)
            .map_err(|e| DbErr::Custom(format!("Failed to create directory: {e}")))?;

        let file_path = dir_path.join(&stored_filename);
        let relative_path = file_path
            .strip_prefix(storage_root())
            .unwrap_or(file_path.as_path())
            .to_string_lossy()
            .to_string();

        fs::write(&file_path, bytes)
            .map_err(|e| DbErr::Custom(format!("Failed to write file: {e}")))?;

        let mut model: ActiveModel = inserted.into();
        model.path = Set(relative_path);

        model.update(db).await
    }
}
