use db::models::tutoring_session;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};

/// Loads a session only if it belongs to the given student. Foreign sessions
/// come back as `None`, indistinguishable from absent ones.
pub async fn owned_session(
    db: &DatabaseConnection,
    session_id: i64,
    student_id: i64,
) -> Result<Option<tutoring_session::Model>, DbErr> {
    let session = tutoring_session::Entity::find_by_id(session_id).one(db).await?;
    Ok(session.filter(|s| s.student_id == student_id))
}
