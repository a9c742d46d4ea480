use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{AudioFileStore, ProjectStore, ProjectTaskStore};
use crate::error::SyncError;
use crate::model::{ProjectTask, ProjectTaskType};
use crate::sync::analyzer::{AnalyzeService, AnalyzeSummary};
use crate::sync::executor::TaskExecutor;
use crate::sync::handlers::{BackupFullHandler, UploadAudioHandler};
use crate::sync::queue::TaskQueue;
use crate::sync::reconcile::Reconciler;
use crate::sync::recovery::{RecoverySummary, recover_pending_tasks};
use crate::sync::storage::ObjectStorage;
use crate::sync::tracking::TrackingFileStore;
use crate::sync::walker::{WalkSummary, walk};

/// The scrape, analyze and drain stages wired around one shared queue and
/// one tracking file store.
pub struct SyncPipeline {
    root: PathBuf,
    projects: Arc<dyn ProjectStore>,
    tasks: Arc<dyn ProjectTaskStore>,
    queue: Arc<TaskQueue>,
    reconciler: Reconciler,
    analyzer: AnalyzeService,
    executor: TaskExecutor,
}

impl SyncPipeline {
    pub fn new<C>(
        root: PathBuf,
        queue_capacity: usize,
        catalog: Arc<C>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Result<Self, SyncError>
    where
        C: ProjectStore + ProjectTaskStore + AudioFileStore + 'static,
    {
        let projects: Arc<dyn ProjectStore> = catalog.clone();
        let tasks: Arc<dyn ProjectTaskStore> = catalog.clone();
        let audio_files: Arc<dyn AudioFileStore> = catalog;
        let tracking = Arc::new(TrackingFileStore::new());
        let queue = Arc::new(TaskQueue::new(queue_capacity)?);

        let reconciler = Reconciler::new(root.clone(), projects.clone(), tracking.clone());
        let analyzer = AnalyzeService::new(
            root.clone(),
            projects.clone(),
            tasks.clone(),
            tracking,
            queue.clone(),
        );
        let executor = TaskExecutor::new(
            tasks.clone(),
            Arc::new(UploadAudioHandler::new(
                root.clone(),
                projects.clone(),
                audio_files,
                storage.clone(),
            )),
            Arc::new(BackupFullHandler::new(root.clone(), projects.clone(), storage)),
        );

        Ok(Self {
            root,
            projects,
            tasks,
            queue,
            reconciler,
            analyzer,
            executor,
        })
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub async fn scrape_once(&self, cancel: &CancellationToken) -> Result<WalkSummary, SyncError> {
        let summary = walk(&self.root, &self.reconciler, cancel).await?;
        debug!(
            directories = summary.directories_visited,
            projects = summary.project_folders,
            skipped = summary.skipped.len(),
            "scrape cycle finished"
        );
        Ok(summary)
    }

    pub async fn analyze_once(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AnalyzeSummary, SyncError> {
        self.analyzer.analyze_all(cancel).await
    }

    /// Executes queued tasks until the queue is empty or cancellation is
    /// requested. A task whose execution errors out is not re-queued.
    pub async fn drain_once(&self, cancel: &CancellationToken) -> Result<usize, SyncError> {
        let mut executed = 0;
        while !cancel.is_cancelled() {
            let Some(task) = self.queue.dequeue() else {
                break;
            };
            self.executor.execute(task, cancel).await?;
            executed += 1;
        }
        Ok(executed)
    }

    pub async fn recover(&self) -> Result<RecoverySummary, SyncError> {
        recover_pending_tasks(self.tasks.as_ref(), &self.queue).await
    }

    /// Runs a task created outside the analyzer right away, bypassing the queue.
    pub async fn run_task(
        &self,
        project_id: Uuid,
        task_type: ProjectTaskType,
        cancel: &CancellationToken,
    ) -> Result<ProjectTask, SyncError> {
        if !self.projects.project_exists(project_id).await? {
            return Err(SyncError::EntityNotFound {
                entity: "project",
                id: project_id,
            });
        }
        let task = self
            .executor
            .execute(ProjectTask::new(project_id, task_type), cancel)
            .await?;
        info!(task_id = %task.id, status = ?task.status, "task finished");
        Ok(task)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
