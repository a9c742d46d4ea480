use std::collections::HashMap;

use tempfile::tempdir;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |name| values.get(name).cloned()
}

fn minimal() -> Vec<(&'static str, &'static str)> {
    vec![
        ("ABLESYNC_ROOT_DIR", "/music/projects"),
        ("ABLESYNC_STORAGE_URL", "http://127.0.0.1:9000"),
    ]
}

#[test]
fn config_uses_defaults_when_optional_settings_are_absent() {
    let config = DaemonConfig::from_lookup(lookup_from(&minimal()), Path::new("/home/u")).unwrap();
    assert_eq!(config.root_dir, PathBuf::from("/music/projects"));
    assert_eq!(config.scrape_interval, Duration::from_secs(300));
    assert_eq!(config.analyze_interval, Duration::from_secs(15));
    assert_eq!(config.drain_interval, Duration::from_millis(1000));
    assert_eq!(config.queue_capacity, 64);
    assert_eq!(config.upload_concurrency, 2);
    assert!(config.database_url.is_none());
    assert!(config.storage_token.is_none());
}

#[test]
fn config_expands_home_in_root_dir() {
    let config = DaemonConfig::from_lookup(
        lookup_from(&[
            ("ABLESYNC_ROOT_DIR", "~/Music/Ableton"),
            ("ABLESYNC_STORAGE_URL", "http://127.0.0.1:9000"),
        ]),
        Path::new("/home/u"),
    )
    .unwrap();
    assert_eq!(config.root_dir, PathBuf::from("/home/u/Music/Ableton"));
}

#[test]
fn config_reads_overrides() {
    let mut pairs = minimal();
    pairs.extend([
        ("ABLESYNC_SCRAPE_INTERVAL_SECS", "60"),
        ("ABLESYNC_DRAIN_INTERVAL_MS", "250"),
        ("ABLESYNC_QUEUE_CAPACITY", "8"),
        ("ABLESYNC_DATABASE_URL", "sqlite:///tmp/catalog.db"),
        ("ABLESYNC_STORAGE_TOKEN", "secret"),
    ]);
    let config = DaemonConfig::from_lookup(lookup_from(&pairs), Path::new("/home/u")).unwrap();
    assert_eq!(config.scrape_interval, Duration::from_secs(60));
    assert_eq!(config.drain_interval, Duration::from_millis(250));
    assert_eq!(config.queue_capacity, 8);
    assert_eq!(config.database_url.as_deref(), Some("sqlite:///tmp/catalog.db"));
    assert_eq!(config.storage_token.as_deref(), Some("secret"));
}

#[test]
fn config_requires_root_and_storage_url() {
    let err = DaemonConfig::from_lookup(
        lookup_from(&[("ABLESYNC_STORAGE_URL", "http://127.0.0.1:9000")]),
        Path::new("/home/u"),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::Configuration(message) if message.contains("ABLESYNC_ROOT_DIR")));

    let err = DaemonConfig::from_lookup(
        lookup_from(&[("ABLESYNC_ROOT_DIR", "/music")]),
        Path::new("/home/u"),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::Configuration(message) if message.contains("ABLESYNC_STORAGE_URL")));
}

#[test]
fn config_rejects_zero_and_garbage_numbers() {
    let mut zero = minimal();
    zero.push(("ABLESYNC_QUEUE_CAPACITY", "0"));
    assert!(matches!(
        DaemonConfig::from_lookup(lookup_from(&zero), Path::new("/home/u")),
        Err(SyncError::Configuration(_))
    ));

    let mut garbage = minimal();
    garbage.push(("ABLESYNC_ANALYZE_INTERVAL_SECS", "soon"));
    assert!(matches!(
        DaemonConfig::from_lookup(lookup_from(&garbage), Path::new("/home/u")),
        Err(SyncError::Configuration(_))
    ));
}

#[test]
fn expand_with_home_leaves_absolute_paths_alone() {
    let home = Path::new("/home/u");
    assert_eq!(expand_with_home("~", home), PathBuf::from("/home/u"));
    assert_eq!(expand_with_home("/srv/music", home), PathBuf::from("/srv/music"));
    assert_eq!(expand_with_home("~user/x", home), PathBuf::from("~user/x"));
}

fn config_for(root: &Path, db: &Path) -> DaemonConfig {
    DaemonConfig {
        root_dir: root.to_path_buf(),
        scrape_interval: Duration::from_secs(300),
        analyze_interval: Duration::from_secs(15),
        drain_interval: Duration::from_millis(1000),
        queue_capacity: 4,
        database_url: Some(format!("sqlite://{}", db.display())),
        storage_url: "http://127.0.0.1:9".into(),
        storage_token: None,
        upload_concurrency: 1,
    }
}

#[tokio::test]
async fn bootstrap_rejects_missing_root() {
    let temp = tempdir().unwrap();
    let config = config_for(&temp.path().join("missing"), &temp.path().join("catalog.db"));
    assert!(DaemonRuntime::bootstrap(config).await.is_err());
}

#[tokio::test]
async fn run_once_over_empty_root_succeeds() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("projects");
    std::fs::create_dir(&root).unwrap();
    let db = temp.path().join("catalog.db");

    let runtime = DaemonRuntime::bootstrap(config_for(&root, &db)).await.unwrap();
    runtime.run_once().await.unwrap();

    assert!(db.exists());
}

#[tokio::test]
async fn run_task_for_unknown_project_fails() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("catalog.db");
    let runtime = DaemonRuntime::bootstrap(config_for(temp.path(), &db)).await.unwrap();

    let result = runtime
        .run_task(ProjectTaskType::BackupFull, Uuid::new_v4())
        .await;
    assert!(result.is_err());
}
