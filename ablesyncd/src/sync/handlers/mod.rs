mod backup_full;
mod upload_audio;

pub use backup_full::BackupFullHandler;
pub use upload_audio::UploadAudioHandler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::ProjectStore;
use crate::error::SyncError;
use crate::model::Project;
use crate::sync::paths::resolve_project_dir;

async fn load_project(
    projects: &Arc<dyn ProjectStore>,
    root: &Path,
    project_id: uuid::Uuid,
) -> Result<(Project, PathBuf), SyncError> {
    let project = projects
        .get_project(project_id)
        .await?
        .ok_or(SyncError::EntityNotFound {
            entity: "project",
            id: project_id,
        })?;
    let dir = resolve_project_dir(root, &project.relative_path)?;
    Ok((project, dir))
}
