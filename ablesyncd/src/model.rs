use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::SyncError;

/// Current time as unix seconds, the resolution the catalog persists.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Created,
    UpToDate,
    PendingActions,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub artist_id: Option<Uuid>,
    /// `/`-separated, relative to the configured root.
    pub relative_path: String,
    pub status: ProjectStatus,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub scraped_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub artist_id: Option<Uuid>,
    pub relative_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectTaskType {
    UploadAudio,
    BackupFull,
}

impl ProjectTaskType {
    pub fn name(self) -> &'static str {
        match self {
            ProjectTaskType::UploadAudio => "upload-audio",
            ProjectTaskType::BackupFull => "backup-full",
        }
    }
}

impl FromStr for ProjectTaskType {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "upload-audio" => Ok(ProjectTaskType::UploadAudio),
            "backup-full" => Ok(ProjectTaskType::BackupFull),
            other => Err(SyncError::UnsupportedTask(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectTaskStatus {
    Created,
    Processing,
    Done,
    Failed,
}

impl ProjectTaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectTaskStatus::Done | ProjectTaskStatus::Failed)
    }

    /// Position in the Created -> Processing -> Done/Failed progression.
    pub fn rank(self) -> i64 {
        match self {
            ProjectTaskStatus::Created => 0,
            ProjectTaskStatus::Processing => 1,
            ProjectTaskStatus::Done | ProjectTaskStatus::Failed => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTask {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_type: ProjectTaskType,
    pub status: ProjectTaskStatus,
    pub parameter: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl ProjectTask {
    pub fn new(project_id: Uuid, task_type: ProjectTaskType) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            task_type,
            status: ProjectTaskStatus::Created,
            parameter: None,
            created_at: unix_now(),
            updated_at: None,
            completed_at: None,
        }
    }

    pub fn is_pending(&self, task_type: ProjectTaskType) -> bool {
        self.task_type == task_type && !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
}

impl AudioFormat {
    /// Upload preference, best first.
    pub const PREFERENCE: [AudioFormat; 3] = [AudioFormat::Mp3, AudioFormat::Wav, AudioFormat::Flac];

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg3",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::PREFERENCE
            .into_iter()
            .find(|format| extension.eq_ignore_ascii_case(format.extension()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub id: Uuid,
    pub project_id: Uuid,
    pub format: AudioFormat,
    pub name: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub synced_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAudioFile {
    pub project_id: Uuid,
    pub format: AudioFormat,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_format_maps_extensions_case_insensitively() {
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("flac"), Some(AudioFormat::Flac));
        assert_eq!(AudioFormat::from_extension("als"), None);
    }

    #[test]
    fn audio_format_content_types() {
        assert_eq!(AudioFormat::Mp3.content_type(), "audio/mpeg3");
        assert_eq!(AudioFormat::Wav.content_type(), "audio/wav");
        assert_eq!(AudioFormat::Flac.content_type(), "audio/flac");
    }

    #[test]
    fn task_type_names_parse_back() {
        for task_type in [ProjectTaskType::UploadAudio, ProjectTaskType::BackupFull] {
            assert_eq!(task_type.name().parse::<ProjectTaskType>().unwrap(), task_type);
        }
        assert!(matches!(
            "render-stems".parse::<ProjectTaskType>(),
            Err(SyncError::UnsupportedTask(name)) if name == "render-stems"
        ));
    }

    #[test]
    fn terminal_statuses_rank_highest() {
        assert!(ProjectTaskStatus::Done.is_terminal());
        assert!(ProjectTaskStatus::Failed.is_terminal());
        assert!(!ProjectTaskStatus::Processing.is_terminal());
        assert!(ProjectTaskStatus::Created.rank() < ProjectTaskStatus::Processing.rank());
        assert!(ProjectTaskStatus::Processing.rank() < ProjectTaskStatus::Failed.rank());
    }

    #[test]
    fn pending_matches_type_and_non_terminal_status() {
        let mut task = ProjectTask::new(Uuid::new_v4(), ProjectTaskType::UploadAudio);
        assert!(task.is_pending(ProjectTaskType::UploadAudio));
        assert!(!task.is_pending(ProjectTaskType::BackupFull));
        task.status = ProjectTaskStatus::Done;
        assert!(!task.is_pending(ProjectTaskType::UploadAudio));
    }
}
