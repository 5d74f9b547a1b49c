use db::models::generation_job;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

/// Fetches a generation job only when it belongs to `teacher_id`. Foreign
/// jobs come back as `None` so handlers answer 404 without leaking their
/// existence.
pub async fn owned_job(
    db: &DatabaseConnection,
    job_id: i64,
    teacher_id: i64,
) -> Result<Option<generation_job::Model>, DbErr> {
    generation_job::Entity::find_by_id(job_id)
        .filter(generation_job::Column::TeacherId.eq(teacher_id))
        .one(db)
        .await
}

/// Upload gate: the filename must end in `.pdf` and the payload must open
/// with the `%PDF` magic bytes. Everything else is rejected before any job
/// state exists.
pub fn is_pdf(filename: &str, bytes: &[u8]) -> bool {
    filename.to_lowercase().ends_with(".pdf") && bytes.starts_with(b"%PDF")
}

#[cfg(test)]
mod tests {
    use super::is_pdf;

    #[test]
    fn accepts_pdf_extension_and_magic() {
        assert!(is_pdf("lecture.pdf", b"%PDF-1.7 rest"));
        assert!(is_pdf("Lecture.PDF", b"%PDF-1.4"));
    }

    #[test]
    fn rejects_wrong_extension() {
        assert!(!is_pdf("lecture.docx", b"%PDF-1.7"));
        assert!(!is_pdf("lecture", b"%PDF-1.7"));
    }

    #[test]
    fn rejects_wrong_magic_bytes() {
        assert!(!is_pdf("lecture.pdf", b"PK\x03\x04 zip header"));
        assert!(!is_pdf("lecture.pdf", b""));
    }
}
