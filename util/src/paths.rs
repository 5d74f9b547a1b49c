use crate::config::AppConfig;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Create a directory (and all parents) if it doesn't exist, and return the path.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> io::Result<PathBuf> {
    let p = path.as_ref();
    fs::create_dir_all(p)?;
    Ok(p.to_path_buf())
}

/// Ensure the parent directory of a *file path* exists (no-op if none).
pub fn ensure_parent_dir<P: AsRef<Path>>(file_path: P) -> io::Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Global storage root (absolute), from `STORAGE_ROOT`.
/// If relative in env, resolve against current_dir().
pub fn storage_root() -> PathBuf {
    let root = AppConfig::global().storage_root.clone();
    let p = PathBuf::from(root);
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

/// A single activity folder: {STORAGE_ROOT}/activity_{activity_id}
pub fn activity_dir(activity_id: i64) -> PathBuf {
    storage_root().join(format!("activity_{activity_id}"))
}

/// Uploaded source documents for an activity:
/// {STORAGE_ROOT}/activity_{activity_id}/documents
pub fn activity_documents_dir(activity_id: i64) -> PathBuf {
    activity_dir(activity_id).join("documents")
}

/// Build a path for one uploaded document (does not create).
pub fn activity_document_path(activity_id: i64, filename: &str) -> PathBuf {
    activity_documents_dir(activity_id).join(filename)
}
