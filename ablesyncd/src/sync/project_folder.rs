use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::model::NewProject;
use crate::sync::paths::relative_path;

pub const PROJECT_FILE_EXTENSION: &str = "als";
pub const PROJECT_INFO_DIR: &str = "Ableton Project Info";
pub const PROJECT_INFO_FILE: &str = "Project8_1.cfg";
pub const PROJECT_ICON_FILE: &str = "AProject.ico";

const PROJECT_FOLDER_SUFFIX: &str = " Project";

/// Immediate children of a directory, each list sorted by name.
/// Symlinks are left out so a walk cannot loop.
#[derive(Debug, Default, Clone)]
pub struct DirListing {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

impl DirListing {
    pub fn files_with_extension<'a>(
        &'a self,
        extension: &'a str,
    ) -> impl Iterator<Item = &'a PathBuf> + 'a {
        self.files
            .iter()
            .filter(move |path| has_extension(path, extension))
    }
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

pub async fn list_entries(dir: &Path) -> Result<DirListing, SyncError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|err| SyncError::file_access(dir, err))?;
    let mut listing = DirListing::default();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| SyncError::file_access(dir, err))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|err| SyncError::file_access(&entry.path(), err))?;
        if file_type.is_dir() {
            listing.dirs.push(entry.path());
        } else if file_type.is_file() {
            listing.files.push(entry.path());
        }
    }

    listing.files.sort();
    listing.dirs.sort();
    Ok(listing)
}

pub async fn is_project_folder(dir: &Path) -> Result<bool, SyncError> {
    let listing = list_entries(dir).await?;
    Ok(is_project_listing(&listing).await)
}

/// A project folder holds a `.als` set plus the info directory with its
/// config and icon files.
pub async fn is_project_listing(listing: &DirListing) -> bool {
    if listing.files_with_extension(PROJECT_FILE_EXTENSION).next().is_none() {
        return false;
    }
    let Some(info_dir) = listing
        .dirs
        .iter()
        .find(|dir| dir.file_name() == Some(OsStr::new(PROJECT_INFO_DIR)))
    else {
        return false;
    };

    is_file(&info_dir.join(PROJECT_INFO_FILE)).await
        && is_file(&info_dir.join(PROJECT_ICON_FILE)).await
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Folder name with a trailing " Project" removed.
pub fn project_name(dir: &Path) -> String {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(PROJECT_FOLDER_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => name,
    }
}

pub fn extract_project(dir: &Path, root: &Path) -> Result<NewProject, SyncError> {
    Ok(NewProject {
        name: project_name(dir),
        artist_id: None,
        relative_path: relative_path(dir, root)?,
    })
}
