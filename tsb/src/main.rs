//! tsb - build orchestration for TypeScript projects
//!
//! CLI entry point: loads the build descriptor, registers every task and
//! dispatches the subcommand.

use std::path::Path;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result};
use tracing::{debug, info};

use tsbuild::cli::{Cli, Command, generate_after_help};
use tsbuild::{BuildConfig, GitCli, RealFs, TaskRegistry, build_registry, resolve_project, version};

fn setup_logging(log_level: Option<&str>) {
    let level = match log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    // stdout is left to the delegated tools
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
    debug!(?level, "Logging initialized");
}

fn load_registry(config: &BuildConfig) -> Result<TaskRegistry> {
    let root = config.project.root.clone();
    let registry = build_registry(config, &RealFs, Arc::new(GitCli::new(root))).context("Failed to register tasks")?;
    Ok(registry)
}

async fn cmd_run(registry: &TaskRegistry, tasks: &[String]) -> Result<()> {
    for task in tasks {
        registry.run(task).await.with_context(|| format!("Task {} did not complete", task))?;
    }
    info!(count = tasks.len(), "All tasks finished");
    Ok(())
}

async fn cmd_next_version(config: &BuildConfig, kind: tsbuild::BumpKind) -> Result<()> {
    let project = resolve_project(&config.project).context("Failed to resolve project")?;
    let next = version::get_next_version(kind, &project)
        .await
        .context("Failed to compute the next version")?;
    println!("{}", next);
    Ok(())
}

fn load_config(path: &Path) -> Result<BuildConfig> {
    BuildConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    setup_logging(cli.log_level.as_deref());
    let config = load_config(&cli.config)?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::List => {
            let registry = load_registry(&config)?;
            for name in registry.names() {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Plan { task } => {
            let registry = load_registry(&config)?;
            let order = registry
                .execution_order(&task)
                .with_context(|| format!("Failed to plan {}", task))?;
            for name in order {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Run { tasks } => {
            let registry = load_registry(&config)?;
            cmd_run(&registry, &tasks).await
        }
        Command::NextVersion { kind } => cmd_next_version(&config, kind).await,
    }
}
