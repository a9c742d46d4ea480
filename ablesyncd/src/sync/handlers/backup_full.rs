use std::path::PathBuf;
use std::sync::Arc;

use ablesync_core::backup_directory;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::load_project;
use crate::catalog::ProjectStore;
use crate::error::SyncError;
use crate::model::{ProjectTask, unix_now};
use crate::sync::executor::TaskHandler;
use crate::sync::paths::relative_path;
use crate::sync::project_folder::{has_extension, list_entries};
use crate::sync::storage::ObjectStorage;
use crate::sync::tracking::TRACKING_FILE_EXTENSION;

const BACKUP_CONTENT_TYPE: &str = "application/octet-stream";

/// Uploads every file of a project folder under a timestamped backup prefix.
pub struct BackupFullHandler {
    root: PathBuf,
    projects: Arc<dyn ProjectStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl BackupFullHandler {
    pub fn new(
        root: PathBuf,
        projects: Arc<dyn ProjectStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            root,
            projects,
            storage,
        }
    }
}

async fn collect_files(dir: &std::path::Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let listing = list_entries(&current).await?;
        files.extend(listing.files.into_iter().filter(|path| {
            !has_extension(path, TRACKING_FILE_EXTENSION) && !has_extension(path, "partial")
        }));
        pending.extend(listing.dirs);
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl TaskHandler for BackupFullHandler {
    async fn run(&self, task: &ProjectTask, cancel: &CancellationToken) -> Result<(), SyncError> {
        let (project, dir) = load_project(&self.projects, &self.root, task.project_id).await?;
        let files = collect_files(&dir).await?;
        if files.is_empty() {
            return Err(SyncError::EmptyProjectFolder(dir));
        }

        let directory = backup_directory(project.id, unix_now());
        for file in &files {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let name = relative_path(file, &dir)?;
            self.storage
                .store_file(&directory, &name, BACKUP_CONTENT_TYPE, file, cancel)
                .await?;
        }

        info!(project_id = %project.id, files = files.len(), directory = %directory, "project backed up");
        Ok(())
    }
}
