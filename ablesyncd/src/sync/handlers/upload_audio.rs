use std::path::{Path, PathBuf};
use std::sync::Arc;

use ablesync_core::{audio_file_directory, audio_file_name};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::load_project;
use crate::catalog::{AudioFileStore, ProjectStore};
use crate::error::SyncError;
use crate::model::{AudioFormat, NewAudioFile, ProjectTask};
use crate::sync::executor::TaskHandler;
use crate::sync::project_folder::{has_extension, list_entries};
use crate::sync::storage::ObjectStorage;

/// Picks the export to publish: mp3 over wav over flac, and the
/// alphabetically first file within the winning format.
pub fn select_audio_file(files: &[PathBuf]) -> Option<(AudioFormat, &Path)> {
    AudioFormat::PREFERENCE.into_iter().find_map(|format| {
        files
            .iter()
            .filter(|path| has_extension(path, format.extension()))
            .min_by(|a, b| a.file_name().cmp(&b.file_name()))
            .map(|path| (format, path.as_path()))
    })
}

pub struct UploadAudioHandler {
    root: PathBuf,
    projects: Arc<dyn ProjectStore>,
    audio_files: Arc<dyn AudioFileStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl UploadAudioHandler {
    pub fn new(
        root: PathBuf,
        projects: Arc<dyn ProjectStore>,
        audio_files: Arc<dyn AudioFileStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            root,
            projects,
            audio_files,
            storage,
        }
    }
}

#[async_trait]
impl TaskHandler for UploadAudioHandler {
    async fn run(&self, task: &ProjectTask, cancel: &CancellationToken) -> Result<(), SyncError> {
        let (project, dir) = load_project(&self.projects, &self.root, task.project_id).await?;
        let listing = list_entries(&dir).await?;
        let (format, source) =
            select_audio_file(&listing.files).ok_or_else(|| SyncError::NoAudioFile(dir.clone()))?;

        let audio_file = if self.audio_files.audio_file_exists(project.id, format).await? {
            self.audio_files
                .get_audio_file(project.id, format)
                .await?
                .ok_or(SyncError::EntityNotFound {
                    entity: "audio file",
                    id: project.id,
                })?
        } else {
            let name = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.audio_files
                .create_audio_file(&NewAudioFile {
                    project_id: project.id,
                    format,
                    name,
                })
                .await?
        };

        self.storage
            .store_file(
                &audio_file_directory(project.id),
                &audio_file_name(audio_file.id),
                format.content_type(),
                source,
                cancel,
            )
            .await?;
        self.audio_files.mark_audio_file_synced(audio_file.id).await?;

        info!(
            project_id = %project.id,
            audio_file_id = %audio_file.id,
            source = %source.display(),
            "uploaded project audio"
        );
        Ok(())
    }
}
