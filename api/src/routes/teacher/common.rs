use db::models::{activity, course};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};

/// Loads a course only if the given teacher owns it. Foreign courses come
/// back as `None` so handlers answer 404 rather than leaking existence.
pub async fn owned_course(
    db: &DatabaseConnection,
    course_id: i64,
    teacher_id: i64,
) -> Result<Option<course::Model>, DbErr> {
    let course = course::Entity::find_by_id(course_id).one(db).await?;
    Ok(course.filter(|c| c.teacher_id == teacher_id))
}

/// Loads an activity together with its course, only if the teacher owns the
/// course.
pub async fn owned_activity(
    db: &DatabaseConnection,
    activity_id: i64,
    teacher_id: i64,
) -> Result<Option<(activity::Model, course::Model)>, DbErr> {
    let Some(activity) = activity::Entity::find_by_id(activity_id).one(db).await? else {
        return Ok(None);
    };

    let Some(course) = owned_course(db, activity.course_id, teacher_id).await? else {
        return Ok(None);
    };

    Ok(Some((activity, course)))
}
