use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{ProjectStore, ProjectTaskStore};
use crate::error::SyncError;
use crate::model::{AudioFormat, Project, ProjectStatus, ProjectTask, ProjectTaskStatus, ProjectTaskType};
use crate::sync::paths::resolve_project_dir;
use crate::sync::project_folder::{DirListing, list_entries};
use crate::sync::queue::TaskQueue;
use crate::sync::tracking::TrackingFileStore;

type TaskCheck = fn(&Project, &DirListing, &[ProjectTask]) -> Option<ProjectTask>;

/// Independent checks, each proposing at most one task.
const CHECKS: &[TaskCheck] = &[needs_audio_upload];

fn needs_audio_upload(
    project: &Project,
    listing: &DirListing,
    existing: &[ProjectTask],
) -> Option<ProjectTask> {
    let has_audio = listing.files.iter().any(|path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension)
            .is_some()
    });
    let pending = existing
        .iter()
        .any(|task| task.is_pending(ProjectTaskType::UploadAudio));
    (has_audio && !pending).then(|| ProjectTask::new(project.id, ProjectTaskType::UploadAudio))
}

/// Derives the tasks a project folder needs from its current contents.
pub struct Analyzer {
    root: PathBuf,
}

impl Analyzer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn derive_tasks(
        &self,
        project: &Project,
        existing: &[ProjectTask],
    ) -> Result<Vec<ProjectTask>, SyncError> {
        let dir = resolve_project_dir(&self.root, &project.relative_path)?;
        let listing = list_entries(&dir).await?;
        Ok(CHECKS
            .iter()
            .filter_map(|check| check(project, &listing, existing))
            .collect())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnalyzeSummary {
    pub analyzed: usize,
    pub skipped: usize,
    pub enqueued: usize,
    pub rejected: usize,
}

/// One analysis pass over every catalog project.
pub struct AnalyzeService {
    root: PathBuf,
    analyzer: Analyzer,
    projects: Arc<dyn ProjectStore>,
    tasks: Arc<dyn ProjectTaskStore>,
    tracking: Arc<TrackingFileStore>,
    queue: Arc<TaskQueue>,
}

impl AnalyzeService {
    pub fn new(
        root: PathBuf,
        projects: Arc<dyn ProjectStore>,
        tasks: Arc<dyn ProjectTaskStore>,
        tracking: Arc<TrackingFileStore>,
        queue: Arc<TaskQueue>,
    ) -> Self {
        Self {
            analyzer: Analyzer::new(root.clone()),
            root,
            projects,
            tasks,
            tracking,
            queue,
        }
    }

    pub async fn analyze_all(&self, cancel: &CancellationToken) -> Result<AnalyzeSummary, SyncError> {
        let mut summary = AnalyzeSummary::default();
        for project in self.projects.list_projects().await? {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            match self.analyze_project(&project).await {
                Ok(Some((enqueued, rejected))) => {
                    summary.analyzed += 1;
                    summary.enqueued += enqueued;
                    summary.rejected += rejected;
                }
                Ok(None) => summary.skipped += 1,
                Err(err) if err.is_folder_scoped() => {
                    warn!(project_id = %project.id, path = %project.relative_path, error = %err, "skipping project analysis");
                    summary.skipped += 1;
                }
                Err(err) if err.is_domain() => {
                    error!(project_id = %project.id, path = %project.relative_path, error = %err, "could not analyze project");
                    summary.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if summary.enqueued > 0 || summary.rejected > 0 {
            info!(
                analyzed = summary.analyzed,
                enqueued = summary.enqueued,
                rejected = summary.rejected,
                "analysis cycle finished"
            );
        }
        Ok(summary)
    }

    /// Returns `None` when the project is not eligible, otherwise the
    /// number of tasks enqueued and rejected.
    pub async fn analyze_project(
        &self,
        project: &Project,
    ) -> Result<Option<(usize, usize)>, SyncError> {
        if project.status == ProjectStatus::Invalid {
            debug!(project_id = %project.id, "project is invalid, not analyzing");
            return Ok(None);
        }
        let dir = resolve_project_dir(&self.root, &project.relative_path)?;
        let _guard = self.tracking.lock(&dir).await;

        let marker = self.tracking.read_marker(&dir).await?;
        if marker.is_invalid_local() || marker.project_id != project.id {
            debug!(project_id = %project.id, "tracking file does not vouch for project, not analyzing");
            return Ok(None);
        }

        let existing = self.tasks.list_tasks_for_project(project.id).await?;
        let derived = self.analyzer.derive_tasks(project, &existing).await?;

        let mut enqueued = 0;
        let mut rejected = 0;
        for task in derived {
            let task = self.tasks.create_task(&task).await?;
            match self.queue.enqueue(task.clone()) {
                Ok(()) => enqueued += 1,
                Err(SyncError::QueueFull { capacity }) => {
                    warn!(project_id = %project.id, task_id = %task.id, capacity, "task queue full, dropping task");
                    self.tasks
                        .mark_task_status(task.id, ProjectTaskStatus::Failed)
                        .await?;
                    rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }

        let outstanding = existing.iter().any(|task| !task.status.is_terminal()) || enqueued > 0;
        let status = if outstanding {
            ProjectStatus::PendingActions
        } else {
            ProjectStatus::UpToDate
        };
        let project = self.projects.mark_project_status(project.id, status).await?;
        self.tracking.mark_analyzed(&dir).await?;
        self.tracking.mirror_project(&dir, &project).await?;

        Ok(Some((enqueued, rejected)))
    }
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
