//! Tracking files (`{project_id}.asi`) tie a local project folder to its
//! catalog record.
//!
//! Every write goes through a `.partial` sibling and a rename, so a reader
//! never sees a half-written marker. Callers that read-modify-write a marker
//! hold the folder's lock from [`TrackingFileStore::lock`] for the duration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::error::SyncError;
use crate::model::{Project, ProjectStatus, unix_now};
use crate::sync::project_folder::{has_extension, list_entries};

pub const TRACKING_FILE_EXTENSION: &str = "asi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingFileStatus {
    UpToDate,
    InvalidLocal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingFile {
    pub project_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub scraped_at: Option<i64>,
    #[serde(default)]
    pub analyzed_at: Option<i64>,
    #[serde(default)]
    pub project_status: Option<ProjectStatus>,
    pub status: TrackingFileStatus,
}

impl TrackingFile {
    pub fn new(project_id: Uuid) -> Self {
        let now = unix_now();
        Self {
            project_id,
            created_at: now,
            updated_at: now,
            scraped_at: Some(now),
            analyzed_at: None,
            project_status: None,
            status: TrackingFileStatus::UpToDate,
        }
    }

    pub fn is_invalid_local(&self) -> bool {
        self.status == TrackingFileStatus::InvalidLocal
    }
}

pub fn tracking_file_path(dir: &Path, project_id: Uuid) -> PathBuf {
    dir.join(format!("{project_id}.{TRACKING_FILE_EXTENSION}"))
}

#[derive(Default)]
pub struct TrackingFileStore {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl TrackingFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, dir: &Path) -> DirectoryGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(dir.to_path_buf()).or_default().clone()
        };
        DirectoryGuard {
            store: self,
            dir: dir.to_path_buf(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn release(&self, dir: &Path) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(dir)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(dir);
        }
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn has_marker(&self, dir: &Path) -> Result<bool, SyncError> {
        Ok(single_marker(dir).await?.is_some())
    }

    pub async fn read_marker(&self, dir: &Path) -> Result<TrackingFile, SyncError> {
        let path = single_marker(dir)
            .await?
            .ok_or_else(|| SyncError::TrackingFileNotFound(dir.to_path_buf()))?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| SyncError::file_access(&path, err))?;
        let marker: TrackingFile =
            serde_json::from_slice(&bytes).map_err(|err| SyncError::InvalidTrackingFile {
                path: path.clone(),
                reason: err.to_string(),
            })?;

        let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
        if stem != marker.project_id.to_string() {
            return Err(SyncError::InvalidTrackingFile {
                path,
                reason: format!("file name does not match project {}", marker.project_id),
            });
        }
        Ok(marker)
    }

    pub async fn create_marker(
        &self,
        dir: &Path,
        project_id: Uuid,
    ) -> Result<TrackingFile, SyncError> {
        if single_marker(dir).await?.is_some() {
            return Err(SyncError::TrackingFileExists(dir.to_path_buf()));
        }
        let marker = TrackingFile::new(project_id);
        write_marker(&tracking_file_path(dir, project_id), &marker).await?;
        Ok(marker)
    }

    /// Replaces the marker wholesale. The project id cannot change.
    pub async fn overwrite_marker(
        &self,
        dir: &Path,
        updated: &TrackingFile,
    ) -> Result<TrackingFile, SyncError> {
        let current = self.read_marker(dir).await?;
        if current.project_id != updated.project_id {
            return Err(SyncError::InvalidTrackingFile {
                path: tracking_file_path(dir, current.project_id),
                reason: format!(
                    "cannot rewrite marker for project {} as {}",
                    current.project_id, updated.project_id
                ),
            });
        }
        let mut marker = updated.clone();
        marker.created_at = current.created_at;
        marker.updated_at = unix_now().max(current.updated_at);
        write_marker(&tracking_file_path(dir, marker.project_id), &marker).await?;
        Ok(marker)
    }

    pub async fn delete_marker(&self, dir: &Path) -> Result<(), SyncError> {
        let path = single_marker(dir)
            .await?
            .ok_or_else(|| SyncError::TrackingFileNotFound(dir.to_path_buf()))?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|err| SyncError::file_access(&path, err))
    }

    pub async fn mark_invalid_local(&self, dir: &Path) -> Result<TrackingFile, SyncError> {
        let mut marker = self.read_marker(dir).await?;
        marker.status = TrackingFileStatus::InvalidLocal;
        self.overwrite_marker(dir, &marker).await
    }

    pub async fn mark_analyzed(&self, dir: &Path) -> Result<TrackingFile, SyncError> {
        let mut marker = self.read_marker(dir).await?;
        marker.analyzed_at = Some(unix_now());
        self.overwrite_marker(dir, &marker).await
    }

    /// Copies the catalog's view of the project into the marker.
    pub async fn mirror_project(
        &self,
        dir: &Path,
        project: &Project,
    ) -> Result<TrackingFile, SyncError> {
        let mut marker = self.read_marker(dir).await?;
        marker.scraped_at = project.scraped_at.or(marker.scraped_at);
        marker.project_status = Some(project.status);
        self.overwrite_marker(dir, &marker).await
    }
}

async fn single_marker(dir: &Path) -> Result<Option<PathBuf>, SyncError> {
    let listing = list_entries(dir).await?;
    let mut markers = listing
        .files
        .into_iter()
        .filter(|path| has_extension(path, TRACKING_FILE_EXTENSION));
    let first = markers.next();
    if markers.next().is_some() {
        return Err(SyncError::MultipleTrackingFiles(dir.to_path_buf()));
    }
    Ok(first)
}

async fn write_marker(target: &Path, marker: &TrackingFile) -> Result<(), SyncError> {
    let bytes = serde_json::to_vec_pretty(marker).map_err(|err| SyncError::InvalidTrackingFile {
        path: target.to_path_buf(),
        reason: err.to_string(),
    })?;
    let partial = partial_path(target);
    let result = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        tokio::fs::rename(&partial, target).await
    }
    .await;

    if let Err(err) = result {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(SyncError::file_access(target, err));
    }
    Ok(())
}

pub(crate) fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}

/// Exclusive hold on one folder's tracking file. The folder's entry in the
/// lock map goes away with its last holder or waiter.
pub struct DirectoryGuard<'a> {
    store: &'a TrackingFileStore,
    dir: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DirectoryGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.store.release(&self.dir);
    }
}
