use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("{path} is outside of root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("path contains unsupported component: {0}")]
    UnsupportedComponent(String),
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
}

/// Relative path of `dir` under `root`, `/`-separated regardless of platform.
pub fn relative_path(dir: &Path, root: &Path) -> Result<String, PathError> {
    let rest = dir
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot {
            path: dir.to_path_buf(),
            root: root.to_path_buf(),
        })?;

    let mut parts = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| PathError::NonUtf8(dir.to_path_buf()))?;
                parts.push(part);
            }
            Component::CurDir => continue,
            other => {
                return Err(PathError::UnsupportedComponent(
                    other.as_os_str().to_string_lossy().into_owned(),
                ));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Maps a stored relative path back under `root`.
pub fn resolve_project_dir(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let mut out = root.to_path_buf();
    for part in relative.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(PathError::UnsupportedComponent(part.to_string())),
            _ => {
                // Each segment must be a single normal component.
                let mut components = Path::new(part).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(segment)), None) => out.push(segment),
                    _ => return Err(PathError::UnsupportedComponent(part.to_string())),
                }
            }
        }
    }
    Ok(out)
}
