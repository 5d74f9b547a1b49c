use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::models::{
    activity::Model as ActivityModel,
    exercise_attempt::{Column as AttemptCol, Entity as AttemptEntity, Model as AttemptModel},
    submission::{
        Column as SubCol, Entity as SubmissionEntity, Model as SubmissionModel, SubmissionStatus,
    },
};

/// Minimum per-exercise grade that counts as a pass.
pub const PASSING_GRADE: i32 = 60;

#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("No graded submission exists for this activity")]
    NotGraded,
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// The graded outcome for one (student, activity) pair.
///
/// The per-exercise grades on the attempts are the persisted truth; `grade`
/// is the derived activity-level mean, recomputed on every read.
#[derive(Debug, Clone)]
pub struct ActivityGrade {
    pub submission: SubmissionModel,
    pub attempts: Vec<AttemptModel>,
    pub grade: f64,
    pub passed: bool,
}

/// One row of a student's grade listing.
#[derive(Debug, Clone)]
pub struct StudentGrade {
    pub submission: SubmissionModel,
    pub activity: ActivityModel,
    pub grade: f64,
    pub passed: bool,
}

pub fn is_passing(grade: i32) -> bool {
    grade >= PASSING_GRADE
}

/// Round to one decimal for display.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Arithmetic mean of per-exercise grades, rounded to one decimal.
pub fn mean_grade(grades: &[i32]) -> Option<f64> {
    if grades.is_empty() {
        return None;
    }
    let sum: i64 = grades.iter().map(|g| *g as i64).sum();
    Some(round1(sum as f64 / grades.len() as f64))
}

fn fold_attempts(attempts: &[AttemptModel]) -> (f64, bool) {
    let grades: Vec<i32> = attempts.iter().filter_map(|a| a.grade).collect();
    let grade = mean_grade(&grades).unwrap_or(0.0);
    (grade, grade >= PASSING_GRADE as f64)
}

/// The graded result for one student on one activity.
///
/// Fails with [`GradeError::NotGraded`] while no final submission has been
/// graded yet.
pub async fn activity_grade(
    db: &DatabaseConnection,
    activity_id: i64,
    student_id: i64,
) -> Result<ActivityGrade, GradeError> {
    let submission = SubmissionEntity::find()
        .filter(SubCol::ActivityId.eq(activity_id))
        .filter(SubCol::StudentId.eq(student_id))
        .filter(SubCol::Status.eq(SubmissionStatus::Graded))
        .one(db)
        .await?
        .ok_or(GradeError::NotGraded)?;

    let attempts = AttemptEntity::find()
        .filter(AttemptCol::SubmissionId.eq(submission.id))
        .order_by_asc(AttemptCol::ExerciseId)
        .all(db)
        .await?;

    let (grade, passed) = fold_attempts(&attempts);

    Ok(ActivityGrade {
        submission,
        attempts,
        grade,
        passed,
    })
}

/// All graded activities for one student, newest submission first.
pub async fn student_grades(
    db: &DatabaseConnection,
    student_id: i64,
) -> Result<Vec<StudentGrade>, sea_orm::DbErr> {
    let rows: Vec<(SubmissionModel, Option<ActivityModel>)> = SubmissionEntity::find()
        .filter(SubCol::StudentId.eq(student_id))
        .filter(SubCol::Status.eq(SubmissionStatus::Graded))
        .find_also_related(crate::models::activity::Entity)
        .order_by_desc(SubCol::SubmittedAt)
        .all(db)
        .await?;

    let submission_ids: Vec<i64> = rows.iter().map(|(s, _)| s.id).collect();
    let attempts = AttemptEntity::find()
        .filter(AttemptCol::SubmissionId.is_in(submission_ids))
        .all(db)
        .await?;

    let mut per_submission: HashMap<i64, Vec<AttemptModel>> = HashMap::new();
    for attempt in attempts {
        per_submission
            .entry(attempt.submission_id)
            .or_default()
            .push(attempt);
    }

    let mut grades = Vec::with_capacity(rows.len());
    for (submission, activity_opt) in rows {
        let Some(activity) = activity_opt else { continue };
        let attempts = per_submission
            .get(&submission.id)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let (grade, passed) = fold_attempts(attempts);
        grades.push(StudentGrade {
            submission,
            activity,
            grade,
            passed,
        });
    }

    Ok(grades)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_grade_rounds_to_one_decimal() {
        assert_eq!(mean_grade(&[85]), Some(85.0));
        assert_eq!(mean_grade(&[80, 85]), Some(82.5));
        assert_eq!(mean_grade(&[70, 80, 95]), Some(81.7));
        assert_eq!(mean_grade(&[0, 0, 100]), Some(33.3));
        assert_eq!(mean_grade(&[]), None);
    }

    #[test]
    fn passing_threshold_is_inclusive() {
        assert!(is_passing(60));
        assert!(is_passing(100));
        assert!(!is_passing(59));
        assert!(!is_passing(0));
    }

    #[test]
    fn fold_attempts_handles_ungraded_rows() {
        let (grade, passed) = fold_attempts(&[]);
        assert_eq!(grade, 0.0);
        assert!(!passed);
    }
}
