//! Remote catalog of projects, their tasks and their audio files.
//!
//! The pipeline only talks to the traits here; [`SqliteCatalog`] is the
//! backing store the daemon runs with.

mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    AudioFile, AudioFormat, NewAudioFile, NewProject, Project, ProjectStatus, ProjectTask,
    ProjectTaskStatus,
};

pub use sqlite::SqliteCatalog;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data directory is unavailable")]
    MissingDataDir,
    #[error("invalid {column} value: {value}")]
    InvalidValue { column: &'static str, value: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("row missing after write")]
    MissingRow,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, project: &NewProject) -> Result<Project, CatalogError>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, CatalogError>;

    async fn get_project_by_path(&self, relative_path: &str)
    -> Result<Option<Project>, CatalogError>;

    async fn project_exists(&self, id: Uuid) -> Result<bool, CatalogError>;

    async fn mark_project_scraped(&self, id: Uuid) -> Result<Project, CatalogError>;

    /// A project already marked Invalid keeps that status.
    async fn mark_project_status(
        &self,
        id: Uuid,
        status: ProjectStatus,
    ) -> Result<Project, CatalogError>;

    async fn list_projects(&self) -> Result<Vec<Project>, CatalogError>;
}

#[async_trait]
pub trait ProjectTaskStore: Send + Sync {
    /// Inserts the task unless its id is already known; returns the stored row.
    async fn create_task(&self, task: &ProjectTask) -> Result<ProjectTask, CatalogError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<ProjectTask>, CatalogError>;

    async fn list_tasks_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectTask>, CatalogError>;

    async fn list_tasks_with_status(
        &self,
        status: ProjectTaskStatus,
    ) -> Result<Vec<ProjectTask>, CatalogError>;

    /// Status only moves forward; a Done or Failed task is returned unchanged.
    async fn mark_task_status(
        &self,
        id: Uuid,
        status: ProjectTaskStatus,
    ) -> Result<ProjectTask, CatalogError>;
}

#[async_trait]
pub trait AudioFileStore: Send + Sync {
    async fn audio_file_exists(
        &self,
        project_id: Uuid,
        format: AudioFormat,
    ) -> Result<bool, CatalogError>;

    async fn get_audio_file(
        &self,
        project_id: Uuid,
        format: AudioFormat,
    ) -> Result<Option<AudioFile>, CatalogError>;

    /// At most one audio file exists per project and format; a second create returns the first.
    async fn create_audio_file(&self, audio_file: &NewAudioFile)
    -> Result<AudioFile, CatalogError>;

    async fn mark_audio_file_synced(&self, id: Uuid) -> Result<AudioFile, CatalogError>;
}
