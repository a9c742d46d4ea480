use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ablesync_core::StorageClient;
use anyhow::Context;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::SqliteCatalog;
use crate::error::SyncError;
use crate::model::{ProjectTask, ProjectTaskType};
use crate::sync::pipeline::SyncPipeline;
use crate::sync::scheduler::Scheduler;
use crate::sync::storage::BlobStorage;
use crate::sync::transfer::TransferClient;

const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 300;
const DEFAULT_ANALYZE_INTERVAL_SECS: u64 = 15;
const DEFAULT_DRAIN_INTERVAL_MS: u64 = 1000;
const DEFAULT_QUEUE_CAPACITY: u64 = 64;
const DEFAULT_UPLOAD_CONCURRENCY: u64 = 2;
const UPLOAD_LINK_VALIDITY: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub root_dir: PathBuf,
    pub scrape_interval: Duration,
    pub analyze_interval: Duration,
    pub drain_interval: Duration,
    pub queue_capacity: usize,
    /// `None` selects the catalog file under the user data directory.
    pub database_url: Option<String>,
    pub storage_url: String,
    pub storage_token: Option<String>,
    pub upload_concurrency: usize,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        let home = dirs::home_dir()
            .ok_or_else(|| SyncError::Configuration("home directory is unavailable".into()))?;
        Self::from_lookup(|name| std::env::var(name).ok(), &home)
    }

    pub fn from_lookup<F>(lookup: F, home: &Path) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root_dir = lookup("ABLESYNC_ROOT_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(|value| expand_with_home(value.trim(), home))
            .ok_or_else(|| SyncError::Configuration("ABLESYNC_ROOT_DIR is not set".into()))?;
        let storage_url = lookup("ABLESYNC_STORAGE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SyncError::Configuration("ABLESYNC_STORAGE_URL is not set".into()))?;
        let storage_token = lookup("ABLESYNC_STORAGE_TOKEN").filter(|value| !value.is_empty());
        let database_url = lookup("ABLESYNC_DATABASE_URL").filter(|value| !value.is_empty());

        let scrape_interval = Duration::from_secs(read_u64_setting(
            &lookup,
            "ABLESYNC_SCRAPE_INTERVAL_SECS",
            DEFAULT_SCRAPE_INTERVAL_SECS,
        )?);
        let analyze_interval = Duration::from_secs(read_u64_setting(
            &lookup,
            "ABLESYNC_ANALYZE_INTERVAL_SECS",
            DEFAULT_ANALYZE_INTERVAL_SECS,
        )?);
        let drain_interval = Duration::from_millis(read_u64_setting(
            &lookup,
            "ABLESYNC_DRAIN_INTERVAL_MS",
            DEFAULT_DRAIN_INTERVAL_MS,
        )?);
        let queue_capacity =
            read_u64_setting(&lookup, "ABLESYNC_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)? as usize;
        let upload_concurrency = read_u64_setting(
            &lookup,
            "ABLESYNC_UPLOAD_CONCURRENCY",
            DEFAULT_UPLOAD_CONCURRENCY,
        )? as usize;

        Ok(Self {
            root_dir,
            scrape_interval,
            analyze_interval,
            drain_interval,
            queue_capacity,
            database_url,
            storage_url,
            storage_token,
            upload_concurrency,
        })
    }
}

pub struct DaemonRuntime {
    config: DaemonConfig,
    pipeline: Arc<SyncPipeline>,
}

impl DaemonRuntime {
    pub async fn bootstrap(config: DaemonConfig) -> anyhow::Result<Self> {
        let metadata = tokio::fs::metadata(&config.root_dir)
            .await
            .with_context(|| format!("root directory {:?} is not accessible", config.root_dir))?;
        if !metadata.is_dir() {
            anyhow::bail!("root directory {:?} is not a directory", config.root_dir);
        }

        let catalog = match &config.database_url {
            Some(url) => SqliteCatalog::new(url).await,
            None => SqliteCatalog::new_default().await,
        }
        .context("failed to initialize catalog")?;
        let client = StorageClient::new(&config.storage_url, config.storage_token.clone())
            .context("invalid storage gateway url")?;
        let storage = BlobStorage::new(
            client,
            TransferClient::new(config.upload_concurrency),
            UPLOAD_LINK_VALIDITY,
        );
        let pipeline = SyncPipeline::new(
            config.root_dir.clone(),
            config.queue_capacity,
            Arc::new(catalog),
            Arc::new(storage),
        )?;

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            root = %self.config.root_dir.display(),
            scrape_secs = self.config.scrape_interval.as_secs(),
            analyze_secs = self.config.analyze_interval.as_secs(),
            queue_capacity = self.config.queue_capacity,
            "daemon started"
        );
        self.pipeline
            .recover()
            .await
            .context("failed to recover tasks from previous run")?;

        let cancel = CancellationToken::new();
        let mut loops = JoinSet::new();

        let pipeline = Arc::clone(&self.pipeline);
        loops.spawn(
            Scheduler::new("scrape", self.config.scrape_interval).run(cancel.clone(), move |cancel| {
                let pipeline = Arc::clone(&pipeline);
                async move { pipeline.scrape_once(&cancel).await.map(|_| ()) }
            }),
        );

        let pipeline = Arc::clone(&self.pipeline);
        loops.spawn(
            Scheduler::new("analyze", self.config.analyze_interval).run(
                cancel.clone(),
                move |cancel| {
                    let pipeline = Arc::clone(&pipeline);
                    async move { pipeline.analyze_once(&cancel).await.map(|_| ()) }
                },
            ),
        );

        let pipeline = Arc::clone(&self.pipeline);
        loops.spawn(
            Scheduler::new("drain", self.config.drain_interval).run(cancel.clone(), move |cancel| {
                let pipeline = Arc::clone(&pipeline);
                async move { pipeline.drain_once(&cancel).await.map(|_| ()) }
            }),
        );

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                info!("shutdown requested");
            }
            Some(joined) = loops.join_next() => {
                warn!(?joined, "a scheduler exited unexpectedly");
            }
        }

        cancel.cancel();
        while let Some(joined) = loops.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "scheduler task panicked");
            }
        }
        let pending = self.pipeline.queue().count();
        if pending > 0 {
            info!(pending, "queued tasks will be recovered on next start");
        }
        info!("daemon stopped");
        Ok(())
    }

    /// One scrape, one analysis and one drain, then return.
    pub async fn run_once(self) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        self.pipeline
            .recover()
            .await
            .context("failed to recover tasks from previous run")?;
        let walk = self.pipeline.scrape_once(&cancel).await.context("scrape failed")?;
        let analysis = self
            .pipeline
            .analyze_once(&cancel)
            .await
            .context("analysis failed")?;
        let executed = self.pipeline.drain_once(&cancel).await.context("drain failed")?;
        info!(
            projects = walk.project_folders,
            skipped_folders = walk.skipped.len(),
            enqueued = analysis.enqueued,
            rejected = analysis.rejected,
            executed,
            "single pass finished"
        );
        Ok(())
    }

    pub async fn run_task(
        self,
        task_type: ProjectTaskType,
        project_id: Uuid,
    ) -> anyhow::Result<ProjectTask> {
        let task = self
            .pipeline
            .run_task(project_id, task_type, &CancellationToken::new())
            .await
            .with_context(|| format!("failed to run {} for project {project_id}", task_type.name()))?;
        Ok(task)
    }
}

include!("daemon_helpers.rs");

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
