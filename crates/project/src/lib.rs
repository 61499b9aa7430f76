use std::path::PathBuf;
use thiserror::Error;
use timeline::TimelineError;

mod autosave;
pub use autosave::*;
mod document;
pub use document::*;
mod store;
pub use store::*;

/// Per-user application directory.
pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir);
    base.join("cutline")
}

/// Where projects live unless told otherwise.
pub fn default_projects_root() -> PathBuf {
    app_data_dir().join("projects")
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project already exists: {0}")]
    Exists(PathBuf),
    #[error("project not found: {0}")]
    NotFound(PathBuf),
    #[error("no project snapshot in {0}")]
    NoSnapshot(PathBuf),
    #[error("invalid project name: {0:?}")]
    InvalidName(String),
    #[error("malformed project document: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
