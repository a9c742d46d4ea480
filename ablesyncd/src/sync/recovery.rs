use tracing::{info, warn};

use crate::catalog::ProjectTaskStore;
use crate::error::SyncError;
use crate::model::ProjectTaskStatus;
use crate::sync::queue::TaskQueue;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoverySummary {
    pub requeued: usize,
    pub rejected: usize,
    pub abandoned: usize,
}

/// Rebuilds the in-memory queue after a restart. Created tasks go back on
/// the queue; tasks a previous run left in Processing are failed, since
/// their handler may have partly run.
pub async fn recover_pending_tasks(
    tasks: &dyn ProjectTaskStore,
    queue: &TaskQueue,
) -> Result<RecoverySummary, SyncError> {
    let mut summary = RecoverySummary::default();

    for task in tasks.list_tasks_with_status(ProjectTaskStatus::Processing).await? {
        warn!(task_id = %task.id, project_id = %task.project_id, "task interrupted by previous run, marking failed");
        tasks
            .mark_task_status(task.id, ProjectTaskStatus::Failed)
            .await?;
        summary.abandoned += 1;
    }

    for task in tasks.list_tasks_with_status(ProjectTaskStatus::Created).await? {
        let id = task.id;
        match queue.enqueue(task) {
            Ok(()) => summary.requeued += 1,
            Err(SyncError::QueueFull { capacity }) => {
                warn!(task_id = %id, capacity, "task queue full during recovery, marking failed");
                tasks.mark_task_status(id, ProjectTaskStatus::Failed).await?;
                summary.rejected += 1;
            }
            Err(err) => return Err(err),
        }
    }

    if summary != RecoverySummary::default() {
        info!(
            requeued = summary.requeued,
            rejected = summary.rejected,
            abandoned = summary.abandoned,
            "recovered tasks from previous run"
        );
    }
    Ok(summary)
}
