use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::ProjectStore;
use crate::error::SyncError;
use crate::sync::paths::relative_path;
use crate::sync::project_folder::{extract_project, is_project_folder};
use crate::sync::tracking::TrackingFileStore;
use crate::sync::walker::ProjectFolderHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// New project registered and marker written.
    Discovered(Uuid),
    /// Marker was missing but the catalog already knew the path.
    Readopted(Uuid),
    /// Marker flagged invalid earlier; left alone.
    SkippedInvalid(Uuid),
    /// Marker points at a project the catalog no longer has.
    MarkedInvalid(Uuid),
    Refreshed(Uuid),
}

pub struct Reconciler {
    root: PathBuf,
    projects: Arc<dyn ProjectStore>,
    tracking: Arc<TrackingFileStore>,
}

impl Reconciler {
    pub fn new(
        root: PathBuf,
        projects: Arc<dyn ProjectStore>,
        tracking: Arc<TrackingFileStore>,
    ) -> Self {
        Self {
            root,
            projects,
            tracking,
        }
    }

    pub async fn reconcile(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let _guard = self.tracking.lock(dir).await;

        if !is_project_folder(dir).await? {
            return Err(SyncError::NotAProjectFolder(dir.to_path_buf()));
        }

        if !self.tracking.has_marker(dir).await? {
            return self.register(dir).await;
        }

        let marker = self.tracking.read_marker(dir).await?;
        if marker.is_invalid_local() {
            info!(path = %dir.display(), project_id = %marker.project_id, "skipping invalid local project");
            return Ok(ReconcileOutcome::SkippedInvalid(marker.project_id));
        }

        if !self.projects.project_exists(marker.project_id).await? {
            self.tracking.mark_invalid_local(dir).await?;
            warn!(
                path = %dir.display(),
                project_id = %marker.project_id,
                "project missing from catalog, marked local copy invalid"
            );
            return Ok(ReconcileOutcome::MarkedInvalid(marker.project_id));
        }

        let project = self.projects.mark_project_scraped(marker.project_id).await?;
        self.tracking.mirror_project(dir, &project).await?;
        Ok(ReconcileOutcome::Refreshed(project.id))
    }

    async fn register(&self, dir: &Path) -> Result<ReconcileOutcome, SyncError> {
        let relative = relative_path(dir, &self.root)?;
        if let Some(existing) = self.projects.get_project_by_path(&relative).await? {
            // Catalog write landed but the marker never did.
            let project = self.projects.mark_project_scraped(existing.id).await?;
            self.tracking.create_marker(dir, project.id).await?;
            self.tracking.mirror_project(dir, &project).await?;
            warn!(path = %dir.display(), project_id = %project.id, "recreated missing tracking file");
            return Ok(ReconcileOutcome::Readopted(project.id));
        }

        let new_project = extract_project(dir, &self.root)?;
        let project = self.projects.create_project(&new_project).await?;
        self.tracking.create_marker(dir, project.id).await?;
        info!(
            path = %dir.display(),
            project_id = %project.id,
            name = %project.name,
            "registered new project"
        );
        Ok(ReconcileOutcome::Discovered(project.id))
    }
}

#[async_trait]
impl ProjectFolderHandler for Reconciler {
    async fn handle_project_folder(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        match self.reconcile(dir, cancel).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_folder_scoped() || !err.is_domain() => Err(err),
            Err(err) => {
                error!(path = %dir.display(), error = %err, "could not reconcile project folder");
                Ok(())
            }
        }
    }
}
