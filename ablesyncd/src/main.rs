use ablesyncd::daemon::{DaemonConfig, DaemonRuntime};
use ablesyncd::model::ProjectTaskType;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Once,
    Help,
    RunTask {
        task_type: ProjectTaskType,
        project_id: Uuid,
    },
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" => mode = CliMode::Once,
            "--help" | "-h" => mode = CliMode::Help,
            "--run-task" => {
                let (Some(task_type), Some(project_id)) = (args.next(), args.next()) else {
                    anyhow::bail!("--run-task expects <task-type> <project-id>");
                };
                mode = CliMode::RunTask {
                    task_type: task_type.parse()?,
                    project_id: project_id.parse()?,
                };
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ablesyncd=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: ablesyncd [--once | --run-task <task-type> <project-id>]");
        println!("  --once       Scrape, analyze and drain the queue once, then exit");
        println!("  --run-task   Run upload-audio or backup-full for one project and exit");
        return Ok(());
    }

    init_tracing();
    let config = DaemonConfig::from_env()?;
    let daemon = DaemonRuntime::bootstrap(config).await?;
    match mode {
        CliMode::Run => daemon.run().await,
        CliMode::Once => daemon.run_once().await,
        CliMode::RunTask {
            task_type,
            project_id,
        } => {
            let task = daemon.run_task(task_type, project_id).await?;
            info!(task_id = %task.id, status = ?task.status, "task finished");
            Ok(())
        }
        CliMode::Help => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parse_cli_mode_defaults_to_run() {
        let mode = parse_cli_mode(args(&["ablesyncd"])).unwrap();
        assert_eq!(mode, CliMode::Run);
    }

    #[test]
    fn parse_cli_mode_supports_once_and_help() {
        assert_eq!(parse_cli_mode(args(&["ablesyncd", "--once"])).unwrap(), CliMode::Once);
        assert_eq!(parse_cli_mode(args(&["ablesyncd", "-h"])).unwrap(), CliMode::Help);
    }

    #[test]
    fn parse_cli_mode_reads_run_task_arguments() {
        let id = Uuid::new_v4();
        let mode = parse_cli_mode(args(&[
            "ablesyncd",
            "--run-task",
            "backup-full",
            &id.to_string(),
        ]))
        .unwrap();
        assert_eq!(
            mode,
            CliMode::RunTask {
                task_type: ProjectTaskType::BackupFull,
                project_id: id,
            }
        );
    }

    #[test]
    fn parse_cli_mode_rejects_unknown_task_and_missing_id() {
        let id = Uuid::new_v4().to_string();
        assert!(parse_cli_mode(args(&["ablesyncd", "--run-task", "render-stems", &id])).is_err());
        assert!(parse_cli_mode(args(&["ablesyncd", "--run-task", "upload-audio"])).is_err());
        assert!(parse_cli_mode(args(&["ablesyncd", "--verbose"])).is_err());
    }
}
