use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::catalog::ProjectTaskStore;
use crate::error::SyncError;
use crate::model::{ProjectTask, ProjectTaskStatus, ProjectTaskType};

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, task: &ProjectTask, cancel: &CancellationToken) -> Result<(), SyncError>;
}

/// Runs one task through Created -> Processing -> Done | Failed.
pub struct TaskExecutor {
    tasks: Arc<dyn ProjectTaskStore>,
    upload_audio: Arc<dyn TaskHandler>,
    backup_full: Arc<dyn TaskHandler>,
}

impl TaskExecutor {
    pub fn new(
        tasks: Arc<dyn ProjectTaskStore>,
        upload_audio: Arc<dyn TaskHandler>,
        backup_full: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            tasks,
            upload_audio,
            backup_full,
        }
    }

    fn handler_for(&self, task_type: ProjectTaskType) -> &dyn TaskHandler {
        match task_type {
            ProjectTaskType::UploadAudio => self.upload_audio.as_ref(),
            ProjectTaskType::BackupFull => self.backup_full.as_ref(),
        }
    }

    /// Domain failures end the task as Failed and return `Ok`. Anything else
    /// propagates and leaves the task in Processing for startup recovery.
    pub async fn execute(
        &self,
        task: ProjectTask,
        cancel: &CancellationToken,
    ) -> Result<ProjectTask, SyncError> {
        let stored = self.tasks.create_task(&task).await?;
        if stored.status.is_terminal() {
            debug!(task_id = %stored.id, status = ?stored.status, "task already finished");
            return Ok(stored);
        }

        let task = self
            .tasks
            .mark_task_status(stored.id, ProjectTaskStatus::Processing)
            .await?;
        if task.status.is_terminal() {
            return Ok(task);
        }

        match self.handler_for(task.task_type).run(&task, cancel).await {
            Ok(()) => {
                let done = self
                    .tasks
                    .mark_task_status(task.id, ProjectTaskStatus::Done)
                    .await?;
                info!(task_id = %task.id, project_id = %task.project_id, task_type = ?task.task_type, "task done");
                Ok(done)
            }
            Err(err) if err.is_domain() => {
                error!(task_id = %task.id, project_id = %task.project_id, task_type = ?task.task_type, error = %err, "task failed");
                Ok(self
                    .tasks
                    .mark_task_status(task.id, ProjectTaskStatus::Failed)
                    .await?)
            }
            Err(err) => Err(err),
        }
    }
}
