use uuid::Uuid;

const PROJECTS_FOLDER: &str = "projects";
const AUDIO_FILES_FOLDER: &str = "audiofiles";
const BACKUPS_FOLDER: &str = "backups";

pub fn audio_file_directory(project_id: Uuid) -> String {
    format!("{PROJECTS_FOLDER}/{project_id}/{AUDIO_FILES_FOLDER}")
}

pub fn audio_file_name(audio_file_id: Uuid) -> String {
    audio_file_id.to_string()
}

pub fn backup_directory(project_id: Uuid, stamp: i64) -> String {
    format!("{PROJECTS_FOLDER}/{project_id}/{BACKUPS_FOLDER}/{stamp}")
}

/// Joins a directory and an object name into a single gateway key.
pub fn object_key(directory: &str, name: &str) -> String {
    let directory = directory.trim_matches('/');
    let name = name.trim_start_matches('/');
    if directory.is_empty() {
        name.to_string()
    } else {
        format!("{directory}/{name}")
    }
}
