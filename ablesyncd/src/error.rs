use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::sync::paths::PathError;
use crate::sync::transfer::TransferError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("file access failed at {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a project folder: {0}")]
    NotAProjectFolder(PathBuf),
    #[error("no tracking file in {0}")]
    TrackingFileNotFound(PathBuf),
    #[error("multiple tracking files in {0}")]
    MultipleTrackingFiles(PathBuf),
    #[error("tracking file already exists in {0}")]
    TrackingFileExists(PathBuf),
    #[error("invalid tracking file at {path}: {reason}")]
    InvalidTrackingFile { path: PathBuf, reason: String },
    #[error("{entity} {id} not found")]
    EntityNotFound { entity: &'static str, id: Uuid },
    #[error("task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("no exported audio file in {0}")]
    NoAudioFile(PathBuf),
    #[error("no files to back up in {0}")]
    EmptyProjectFolder(PathBuf),
    #[error("unsupported task type: {0}")]
    UnsupportedTask(String),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("storage error: {0}")]
    Storage(#[from] ablesync_core::StorageError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("catalog error: {0}")]
    Catalog(CatalogError),
    #[error("operation cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn file_access(path: &Path, source: std::io::Error) -> Self {
        SyncError::FileAccess {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Domain errors end a task as Failed; the rest propagate and leave it untouched.
    pub fn is_domain(&self) -> bool {
        !matches!(self, SyncError::Catalog(_) | SyncError::Cancelled)
    }

    /// Errors confined to a single folder that a cycle may log and skip.
    pub fn is_folder_scoped(&self) -> bool {
        matches!(
            self,
            SyncError::FileAccess { .. }
                | SyncError::TrackingFileNotFound(_)
                | SyncError::NotAProjectFolder(_)
                | SyncError::Path(_)
        )
    }
}

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound { entity, id } => SyncError::EntityNotFound { entity, id },
            other => SyncError::Catalog(other),
        }
    }
}
