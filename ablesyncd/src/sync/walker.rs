use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::sync::project_folder::{is_project_listing, list_entries};

#[async_trait]
pub trait ProjectFolderHandler: Send + Sync {
    async fn handle_project_folder(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError>;
}

#[derive(Debug, Default)]
pub struct WalkSummary {
    pub directories_visited: usize,
    pub project_folders: usize,
    /// Subtrees that could not be listed or handled; the walk went on without them.
    pub skipped: Vec<(PathBuf, SyncError)>,
}

/// Depth-first walk from `root`, handing every project folder to `handler`.
///
/// A project folder is a leaf: nothing beneath it is visited. Listing
/// failures below the root skip that subtree only. Handler errors that are
/// not folder-scoped end the walk.
pub async fn walk<H>(
    root: &Path,
    handler: &H,
    cancel: &CancellationToken,
) -> Result<WalkSummary, SyncError>
where
    H: ProjectFolderHandler + ?Sized,
{
    let mut summary = WalkSummary::default();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let listing = match list_entries(&dir).await {
            Ok(listing) => listing,
            Err(err) if dir == root => return Err(err),
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
                summary.skipped.push((dir, err));
                continue;
            }
        };
        summary.directories_visited += 1;

        if is_project_listing(&listing).await {
            summary.project_folders += 1;
            debug!(path = %dir.display(), "found project folder");
            match handler.handle_project_folder(&dir, cancel).await {
                Ok(()) => {}
                Err(err) if err.is_folder_scoped() => {
                    warn!(path = %dir.display(), error = %err, "skipping project folder");
                    summary.skipped.push((dir, err));
                }
                Err(err) => return Err(err),
            }
            continue;
        }

        // Reversed so the stack pops children in name order.
        pending.extend(listing.dirs.into_iter().rev());
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::tempdir;

    use super::*;
    use crate::sync::project_folder::fixtures::make_project_folder;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<PathBuf>>,
        fail_with: Option<fn(&Path) -> SyncError>,
        remove_on_visit: Option<PathBuf>,
    }

    #[async_trait]
    impl ProjectFolderHandler for Recorder {
        async fn handle_project_folder(
            &self,
            dir: &Path,
            _cancel: &CancellationToken,
        ) -> Result<(), SyncError> {
            self.seen.lock().unwrap().push(dir.to_path_buf());
            if let Some(victim) = self.remove_on_visit.as_ref().filter(|victim| victim.exists()) {
                std::fs::remove_dir_all(victim).unwrap();
            }
            match self.fail_with {
                Some(make) => Err(make(dir)),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn finds_nested_projects_in_order() {
        let root = tempdir().unwrap();
        let b = make_project_folder(&root.path().join("b"), "Two Project");
        let a = make_project_folder(&root.path().join("a/deep"), "One Project");
        std::fs::create_dir_all(root.path().join("c/empty")).unwrap();

        let recorder = Recorder::default();
        let summary = walk(root.path(), &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![a, b]);
        assert_eq!(summary.project_folders, 2);
        assert!(summary.skipped.is_empty());
    }

    #[tokio::test]
    async fn does_not_descend_into_project_folders() {
        let root = tempdir().unwrap();
        let outer = make_project_folder(root.path(), "Outer Project");
        make_project_folder(&outer, "Inner Project");

        let recorder = Recorder::default();
        walk(root.path(), &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![outer]);
    }

    #[tokio::test]
    async fn root_project_folder_is_handled() {
        let root = tempdir().unwrap();
        let project = make_project_folder(root.path(), "Song Project");

        let recorder = Recorder::default();
        walk(&project, &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![project]);
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let root = tempdir().unwrap();
        let recorder = Recorder::default();
        let err = walk(&root.path().join("gone"), &recorder, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::FileAccess { .. }));
    }

    #[tokio::test]
    async fn folder_scoped_handler_errors_are_skipped() {
        let root = tempdir().unwrap();
        make_project_folder(root.path(), "One Project");
        make_project_folder(root.path(), "Two Project");

        let recorder = Recorder {
            fail_with: Some(|dir: &Path| SyncError::TrackingFileNotFound(dir.to_path_buf())),
            ..Recorder::default()
        };
        let summary = walk(root.path(), &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
        assert_eq!(summary.skipped.len(), 2);
    }

    #[tokio::test]
    async fn other_handler_errors_abort() {
        let root = tempdir().unwrap();
        make_project_folder(root.path(), "One Project");
        make_project_folder(root.path(), "Two Project");

        let recorder = Recorder {
            fail_with: Some(|dir: &Path| SyncError::MultipleTrackingFiles(dir.to_path_buf())),
            ..Recorder::default()
        };
        let err = walk(root.path(), &recorder, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MultipleTrackingFiles(_)));
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_subtree_is_skipped_and_reported() {
        let root = tempdir().unwrap();
        let first = make_project_folder(&root.path().join("a"), "One Project");
        make_project_folder(&root.path().join("b"), "Two Project");
        let last = make_project_folder(&root.path().join("c"), "Three Project");
        let doomed = root.path().join("b");

        let recorder = Recorder {
            remove_on_visit: Some(doomed.clone()),
            ..Recorder::default()
        };
        let summary = walk(root.path(), &recorder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.skipped.len(), 1);
        let (path, err) = &summary.skipped[0];
        assert_eq!(path, &doomed);
        assert!(matches!(err, SyncError::FileAccess { .. }));
        assert_eq!(*recorder.seen.lock().unwrap(), vec![first, last]);
        assert_eq!(summary.project_folders, 2);
    }

    #[tokio::test]
    async fn cancelled_walk_stops_before_work() {
        let root = tempdir().unwrap();
        make_project_folder(root.path(), "One Project");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let recorder = Recorder::default();
        let err = walk(root.path(), &recorder, &cancel).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
