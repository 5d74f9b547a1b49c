use db::models::{
    activity::{self, ActivityStatus},
    enrollment,
};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};

/// Looks up an activity as one specific student is allowed to see it.
///
/// Returns `None` when the activity does not exist, is not published, or
/// belongs to a course the student is not enrolled in. Callers map all three
/// to the same 404 so unpublished work is indistinguishable from absent work.
pub async fn published_activity_for(
    db: &DatabaseConnection,
    activity_id: i64,
    student_id: i64,
) -> Result<Option<activity::Model>, DbErr> {
    let Some(activity) = activity::Entity::find_by_id(activity_id).one(db).await? else {
        return Ok(None);
    };

    if activity.status != ActivityStatus::Published {
        return Ok(None);
    }

    if !enrollment::Model::is_enrolled(db, activity.course_id, student_id).await? {
        return Ok(None);
    }

    Ok(Some(activity))
}

/// Same lookup without the publication requirement, for reads that must stay
/// available after an activity is archived (e.g. graded results).
pub async fn enrolled_activity_for(
    db: &DatabaseConnection,
    activity_id: i64,
    student_id: i64,
) -> Result<Option<activity::Model>, DbErr> {
    let Some(activity) = activity::Entity::find_by_id(activity_id).one(db).await? else {
        return Ok(None);
    };

    if !enrollment::Model::is_enrolled(db, activity.course_id, student_id).await? {
        return Ok(None);
    }

    Ok(Some(activity))
}
