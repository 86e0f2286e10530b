use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use harvest_backends::{CommandRunner, CommandRunnerConfig, HttpPublisher, DEFAULT_PROGRAM};
use harvest_core::{DatasetSink, HarvestConfig, Orchestrator, RunInput};
use harvest_snapshot::{DirectorySpec, SnapshotTaker};
use harvest_store::{FsStoreProvider, StoreProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("harvest")
        .version(harvest_core::VERSION)
        .about("Run agent tasks and capture the files they produce")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("storage-dir")
                .long("storage-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Local storage root (default: $HARVEST_STORAGE_DIR or ./storage)"),
        )
        .arg(
            Arg::new("workspace-root")
                .long("workspace-root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Workspace root to monitor (default: $ACTOR_OUTPUT_ROOT)"),
        )
        .arg(
            Arg::new("artifact-dir")
                .long("artifact-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Tool scratch directory to monitor (default: $PLAYWRIGHT_ARTIFACT_DIR)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Execute one run from an input record")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .value_parser(value_parser!(PathBuf))
                        .help("Input JSON file (default: INPUT record of the default store)"),
                )
                .arg(
                    Arg::new("run-id")
                        .long("run-id")
                        .help("Run id used in storage keys"),
                )
                .arg(
                    Arg::new("agent-program")
                        .long("agent-program")
                        .default_value(DEFAULT_PROGRAM)
                        .help("Agent CLI executable"),
                )
                .arg(
                    Arg::new("agent-timeout")
                        .long("agent-timeout")
                        .value_parser(value_parser!(u64))
                        .help("Kill the agent after this many seconds"),
                )
                .arg(
                    Arg::new("capture-on-failure")
                        .long("capture-on-failure")
                        .action(ArgAction::SetTrue)
                        .help("Store changed files even when the task fails"),
                ),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Print the snapshot of a directory")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("filtered")
                        .long("filtered")
                        .action(ArgAction::SetTrue)
                        .help("Apply the workspace filter"),
                ),
        )
        .subcommand(
            Command::new("keys")
                .about("List keys of a local store")
                .arg(Arg::new("store").help("Store id (default store when omitted)")),
        )
}

fn init_tracing(matches: &ArgMatches) {
    let level = matches
        .get_one::<String>("log-level")
        .map_or("info", String::as_str);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if matches.get_flag("log-json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> HarvestConfig {
    let mut config = HarvestConfig::from_env();
    if let Some(dir) = matches.get_one::<PathBuf>("storage-dir") {
        config = config.with_storage_dir(dir);
    }
    if let Some(root) = matches.get_one::<PathBuf>("workspace-root") {
        config = config.with_workspace_root(root);
    }
    if let Some(dir) = matches.get_one::<PathBuf>("artifact-dir") {
        config = config.with_tool_artifact_dir(dir);
    }
    config
}

async fn run(config: HarvestConfig, args: &ArgMatches) -> Result<bool> {
    let mut config = config;
    if let Some(run_id) = args.get_one::<String>("run-id") {
        config = config.with_run_id(run_id);
    }
    if args.get_flag("capture-on-failure") {
        config.capture.capture_on_failure = true;
    }

    let mut runner_config = CommandRunnerConfig::new();
    if let Some(program) = args.get_one::<String>("agent-program") {
        runner_config = runner_config.with_program(program);
    }
    if let Some(secs) = args.get_one::<u64>("agent-timeout") {
        runner_config = runner_config.with_timeout(Duration::from_secs(*secs));
    }

    let stores = Arc::new(FsStoreProvider::new(&config.storage_dir));
    let sink = Arc::new(DatasetSink::new(&config.storage_dir));
    let publisher = Arc::new(HttpPublisher::new().context("failed to build HTTP client")?);
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(CommandRunner::new(runner_config)),
        stores,
        sink,
    )
    .with_publisher(publisher);

    let input = match args.get_one::<PathBuf>("input") {
        Some(path) => {
            let raw = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read input {}", path.display()))?;
            let value = serde_json::from_slice(&raw)
                .with_context(|| format!("input {} is not valid JSON", path.display()))?;
            RunInput::from_value(value)?
        }
        None => orchestrator.default_input().await?,
    };

    match orchestrator.run(input).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(true)
        }
        Err(e) => {
            tracing::error!(error = %e, configuration = e.is_configuration(), "Run failed");
            Ok(false)
        }
    }
}

fn snapshot(config: &HarvestConfig, args: &ArgMatches) -> Result<()> {
    let dir = args
        .get_one::<PathBuf>("dir")
        .context("missing directory argument")?;
    let spec = if args.get_flag("filtered") {
        DirectorySpec::filtered(dir, config.filter.clone())
    } else {
        DirectorySpec::unrestricted(dir)
    };

    let snapshot = SnapshotTaker::new().take(&spec);
    for (path, stamp) in snapshot.sorted() {
        println!("{stamp}\t{}", path.display());
    }
    tracing::info!(files = snapshot.len(), mode = spec.mode.name(), "Snapshot taken");
    Ok(())
}

async fn keys(config: &HarvestConfig, args: &ArgMatches) -> Result<()> {
    let provider = FsStoreProvider::new(&config.storage_dir);
    let store = match args.get_one::<String>("store") {
        Some(id) => provider.open(id).await?,
        None => provider.open_default().await?,
    };
    for meta in store.list_keys().await? {
        println!("{}\t{}", meta.size, meta.key);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let matches = cli().get_matches();
    let Some((name, args)) = matches.subcommand() else {
        return Ok(());
    };
    init_tracing(args);
    let config = load_config(args);
    tracing::debug!(?config, "Configuration loaded");

    match name {
        "run" => {
            tracing::info!("Harvest {} starting...", harvest_core::VERSION);
            if !run(config, args).await? {
                std::process::exit(1);
            }
        }
        "snapshot" => snapshot(&config, args)?,
        "keys" => keys(&config, args).await?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let matches = cli()
            .try_get_matches_from([
                "harvest",
                "run",
                "--input",
                "input.json",
                "--workspace-root",
                "/w",
                "--run-id",
                "abc",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert_eq!(args.get_one::<String>("run-id").map(String::as_str), Some("abc"));
        assert_eq!(
            args.get_one::<String>("agent-program").map(String::as_str),
            Some("claude")
        );

        let config = load_config(args);
        assert_eq!(config.workspace_root, PathBuf::from("/w"));
        assert_eq!(config.generation.output_path, PathBuf::from("/w/llms.txt"));
    }

    #[test]
    fn snapshot_requires_directory() {
        assert!(cli().try_get_matches_from(["harvest", "snapshot"]).is_err());
        let matches = cli()
            .try_get_matches_from(["harvest", "snapshot", "/tmp", "--filtered"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(args.get_flag("filtered"));
    }

    #[test]
    fn snapshot_command_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        let matches = cli()
            .try_get_matches_from(["harvest", "snapshot", dir.path().to_str().unwrap()])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        snapshot(&HarvestConfig::new(), args).unwrap();
    }
}
