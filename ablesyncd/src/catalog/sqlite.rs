use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool, migrate::Migrator};
use uuid::Uuid;

use super::{AudioFileStore, CatalogError, ProjectStore, ProjectTaskStore};
use crate::model::{
    AudioFile, AudioFormat, NewAudioFile, NewProject, Project, ProjectStatus, ProjectTask,
    ProjectTaskStatus, ProjectTaskType, unix_now,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const PROJECT_COLUMNS: &str =
    "id, name, artist_id, relative_path, status, created_at, updated_at, scraped_at";
const TASK_COLUMNS: &str =
    "id, project_id, task_type, status, parameter, created_at, updated_at, completed_at";
const AUDIO_FILE_COLUMNS: &str =
    "id, project_id, format, name, created_at, updated_at, synced_at";

pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(database_url: &str) -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let catalog = Self { pool };
        catalog.init().await?;
        Ok(catalog)
    }

    pub async fn new_default() -> Result<Self, CatalogError> {
        let db_path = default_db_path()?;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let catalog = Self { pool };
        catalog.init().await?;
        Ok(catalog)
    }

    pub async fn init(&self) -> Result<(), CatalogError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    async fn get_audio_file_by_id(&self, id: Uuid) -> Result<Option<AudioFile>, CatalogError> {
        let row = sqlx::query(&format!(
            "SELECT {AUDIO_FILE_COLUMNS} FROM audio_files WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(audio_file_from_row).transpose()
    }
}

pub fn default_db_path() -> Result<PathBuf, CatalogError> {
    let base = dirs::data_dir().ok_or(CatalogError::MissingDataDir)?;
    Ok(base.join("ablesync").join("catalog.db"))
}

#[async_trait]
impl ProjectStore for SqliteCatalog {
    async fn create_project(&self, project: &NewProject) -> Result<Project, CatalogError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO projects (id, name, artist_id, relative_path, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(id.to_string())
        .bind(&project.name)
        .bind(project.artist_id.map(|artist| artist.to_string()))
        .bind(&project.relative_path)
        .bind(project_status_as_str(ProjectStatus::Created))
        .bind(unix_now())
        .execute(&self.pool)
        .await?;

        self.get_project(id).await?.ok_or(CatalogError::MissingRow)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, CatalogError> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn get_project_by_path(
        &self,
        relative_path: &str,
    ) -> Result<Option<Project>, CatalogError> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE relative_path = ?1"
        ))
        .bind(relative_path)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn project_exists(&self, id: Uuid) -> Result<bool, CatalogError> {
        let row = sqlx::query("SELECT 1 FROM projects WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_project_scraped(&self, id: Uuid) -> Result<Project, CatalogError> {
        let result = sqlx::query("UPDATE projects SET scraped_at = ?2, updated_at = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(unix_now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound {
                entity: "project",
                id,
            });
        }
        self.get_project(id).await?.ok_or(CatalogError::MissingRow)
    }

    async fn mark_project_status(
        &self,
        id: Uuid,
        status: ProjectStatus,
    ) -> Result<Project, CatalogError> {
        sqlx::query(
            "UPDATE projects SET status = ?2, updated_at = ?3
             WHERE id = ?1 AND status != 'invalid' AND status != ?2",
        )
        .bind(id.to_string())
        .bind(project_status_as_str(status))
        .bind(unix_now())
        .execute(&self.pool)
        .await?;

        self.get_project(id).await?.ok_or(CatalogError::NotFound {
            entity: "project",
            id,
        })
    }

    async fn list_projects(&self) -> Result<Vec<Project>, CatalogError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY relative_path ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(project_from_row).collect()
    }
}

#[async_trait]
impl ProjectTaskStore for SqliteCatalog {
    async fn create_task(&self, task: &ProjectTask) -> Result<ProjectTask, CatalogError> {
        sqlx::query(
            "INSERT INTO project_tasks (
                id, project_id, task_type, status, parameter, created_at, updated_at, completed_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(task.id.to_string())
        .bind(task.project_id.to_string())
        .bind(task_type_as_str(task.task_type))
        .bind(task_status_as_str(task.status))
        .bind(&task.parameter)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .execute(&self.pool)
        .await?;

        self.get_task(task.id).await?.ok_or(CatalogError::MissingRow)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<ProjectTask>, CatalogError> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM project_tasks WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ProjectTask>, CatalogError> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM project_tasks
             WHERE project_id = ?1
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn list_tasks_with_status(
        &self,
        status: ProjectTaskStatus,
    ) -> Result<Vec<ProjectTask>, CatalogError> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM project_tasks
             WHERE status = ?1
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(task_status_as_str(status))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn mark_task_status(
        &self,
        id: Uuid,
        status: ProjectTaskStatus,
    ) -> Result<ProjectTask, CatalogError> {
        // Only forward moves apply: Created -> Processing -> Done | Failed.
        sqlx::query(
            "UPDATE project_tasks
             SET status = ?2,
                 updated_at = ?3,
                 completed_at = CASE WHEN ?4 = 2 THEN ?3 ELSE completed_at END
             WHERE id = ?1
               AND (CASE status
                        WHEN 'created' THEN 0
                        WHEN 'processing' THEN 1
                        ELSE 2
                    END) < ?4",
        )
        .bind(id.to_string())
        .bind(task_status_as_str(status))
        .bind(unix_now())
        .bind(status.rank())
        .execute(&self.pool)
        .await?;

        self.get_task(id).await?.ok_or(CatalogError::NotFound {
            entity: "project task",
            id,
        })
    }
}

#[async_trait]
impl AudioFileStore for SqliteCatalog {
    async fn audio_file_exists(
        &self,
        project_id: Uuid,
        format: AudioFormat,
    ) -> Result<bool, CatalogError> {
        let row = sqlx::query("SELECT 1 FROM audio_files WHERE project_id = ?1 AND format = ?2")
            .bind(project_id.to_string())
            .bind(audio_format_as_str(format))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn get_audio_file(
        &self,
        project_id: Uuid,
        format: AudioFormat,
    ) -> Result<Option<AudioFile>, CatalogError> {
        let row = sqlx::query(&format!(
            "SELECT {AUDIO_FILE_COLUMNS} FROM audio_files WHERE project_id = ?1 AND format = ?2"
        ))
        .bind(project_id.to_string())
        .bind(audio_format_as_str(format))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(audio_file_from_row).transpose()
    }

    async fn create_audio_file(
        &self,
        audio_file: &NewAudioFile,
    ) -> Result<AudioFile, CatalogError> {
        sqlx::query(
            "INSERT INTO audio_files (id, project_id, format, name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_id, format) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(audio_file.project_id.to_string())
        .bind(audio_format_as_str(audio_file.format))
        .bind(&audio_file.name)
        .bind(unix_now())
        .execute(&self.pool)
        .await?;

        self.get_audio_file(audio_file.project_id, audio_file.format)
            .await?
            .ok_or(CatalogError::MissingRow)
    }

    async fn mark_audio_file_synced(&self, id: Uuid) -> Result<AudioFile, CatalogError> {
        let result = sqlx::query(
            "UPDATE audio_files
             SET synced_at = MAX(COALESCE(synced_at, 0), ?2), updated_at = ?2
             WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(unix_now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound {
                entity: "audio file",
                id,
            });
        }
        self.get_audio_file_by_id(id)
            .await?
            .ok_or(CatalogError::MissingRow)
    }
}

fn project_from_row(row: &SqliteRow) -> Result<Project, CatalogError> {
    let artist_id: Option<String> = row.try_get("artist_id")?;
    let status: String = row.try_get("status")?;
    Ok(Project {
        id: parse_uuid("id", row.try_get("id")?)?,
        name: row.try_get("name")?,
        artist_id: artist_id.map(|value| parse_uuid("artist_id", value)).transpose()?,
        relative_path: row.try_get("relative_path")?,
        status: parse_project_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        scraped_at: row.try_get("scraped_at")?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<ProjectTask, CatalogError> {
    let task_type: String = row.try_get("task_type")?;
    let status: String = row.try_get("status")?;
    Ok(ProjectTask {
        id: parse_uuid("id", row.try_get("id")?)?,
        project_id: parse_uuid("project_id", row.try_get("project_id")?)?,
        task_type: parse_task_type(&task_type)?,
        status: parse_task_status(&status)?,
        parameter: row.try_get("parameter")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn audio_file_from_row(row: &SqliteRow) -> Result<AudioFile, CatalogError> {
    let format: String = row.try_get("format")?;
    Ok(AudioFile {
        id: parse_uuid("id", row.try_get("id")?)?,
        project_id: parse_uuid("project_id", row.try_get("project_id")?)?,
        format: parse_audio_format(&format)?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        synced_at: row.try_get("synced_at")?,
    })
}

fn parse_uuid(column: &'static str, value: String) -> Result<Uuid, CatalogError> {
    Uuid::parse_str(&value).map_err(|_| CatalogError::InvalidValue { column, value })
}

fn project_status_as_str(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Created => "created",
        ProjectStatus::UpToDate => "up_to_date",
        ProjectStatus::PendingActions => "pending_actions",
        ProjectStatus::Invalid => "invalid",
    }
}

fn parse_project_status(value: &str) -> Result<ProjectStatus, CatalogError> {
    match value {
        "created" => Ok(ProjectStatus::Created),
        "up_to_date" => Ok(ProjectStatus::UpToDate),
        "pending_actions" => Ok(ProjectStatus::PendingActions),
        "invalid" => Ok(ProjectStatus::Invalid),
        other => Err(CatalogError::InvalidValue {
            column: "status",
            value: other.to_string(),
        }),
    }
}

fn task_type_as_str(task_type: ProjectTaskType) -> &'static str {
    match task_type {
        ProjectTaskType::UploadAudio => "upload_audio",
        ProjectTaskType::BackupFull => "backup_full",
    }
}

fn parse_task_type(value: &str) -> Result<ProjectTaskType, CatalogError> {
    match value {
        "upload_audio" => Ok(ProjectTaskType::UploadAudio),
        "backup_full" => Ok(ProjectTaskType::BackupFull),
        other => Err(CatalogError::InvalidValue {
            column: "task_type",
            value: other.to_string(),
        }),
    }
}

fn task_status_as_str(status: ProjectTaskStatus) -> &'static str {
    match status {
        ProjectTaskStatus::Created => "created",
        ProjectTaskStatus::Processing => "processing",
        ProjectTaskStatus::Done => "done",
        ProjectTaskStatus::Failed => "failed",
    }
}

fn parse_task_status(value: &str) -> Result<ProjectTaskStatus, CatalogError> {
    match value {
        "created" => Ok(ProjectTaskStatus::Created),
        "processing" => Ok(ProjectTaskStatus::Processing),
        "done" => Ok(ProjectTaskStatus::Done),
        "failed" => Ok(ProjectTaskStatus::Failed),
        other => Err(CatalogError::InvalidValue {
            column: "status",
            value: other.to_string(),
        }),
    }
}

fn audio_format_as_str(format: AudioFormat) -> &'static str {
    format.extension()
}

fn parse_audio_format(value: &str) -> Result<AudioFormat, CatalogError> {
    AudioFormat::from_extension(value).ok_or_else(|| CatalogError::InvalidValue {
        column: "format",
        value: value.to_string(),
    })
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
