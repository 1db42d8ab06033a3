//! CLI command definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use crate::config::CONFIG_FILE;
use crate::version::BumpKind;

/// tsb - build orchestration for TypeScript projects
#[derive(Parser)]
#[command(
    name = "tsb",
    about = "Resolve build targets into task graphs and run them",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to the build descriptor
    #[arg(short, long, global = true, default_value = CONFIG_FILE, help = "Path to the build descriptor")]
    pub config: PathBuf,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every registered task
    List,

    /// Print the tasks a run would execute, in order, without running them
    Plan {
        /// Task name, e.g. `lib:dist`
        task: String,
    },

    /// Run tasks in the given order
    Run {
        /// Task names
        #[arg(required = true)]
        tasks: Vec<String>,
    },

    /// Print the next version without changing anything
    NextVersion {
        #[arg(value_enum)]
        kind: BumpKind,
    },
}

/// Result of checking a delegated tool
pub struct ToolCheck {
    pub name: &'static str,
    pub available: bool,
    pub version: Option<String>,
}

impl ToolCheck {
    /// Check if a tool is available and get its version
    pub fn check(name: &'static str, version_args: &[&str]) -> Self {
        debug!(name, ?version_args, "ToolCheck::check: called");
        match std::process::Command::new(name).args(version_args).output() {
            Ok(output) if output.status.success() => Self {
                name,
                available: true,
                version: Some(parse_version(&String::from_utf8_lossy(&output.stdout))),
            },
            _ => Self {
                name,
                available: false,
                version: None,
            },
        }
    }
}

/// First version-like word of a `--version` output
fn parse_version(output: &str) -> String {
    for word in output.split_whitespace() {
        let word = word.trim_start_matches('v');
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let version: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !version.is_empty() {
                return version;
            }
        }
    }
    "unknown".to_string()
}

/// Check the tools most tasks rely on
pub fn check_required_tools() -> Vec<ToolCheck> {
    debug!("check_required_tools: called");
    vec![
        ToolCheck::check("git", &["--version"]),
        ToolCheck::check("node", &["--version"]),
        ToolCheck::check("npm", &["--version"]),
        ToolCheck::check("tsc", &["--version"]),
    ]
}

/// Generate the after_help text with tool checks
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::from("Required Tools:\n");
    for tool in check_required_tools() {
        let icon = if tool.available { "\u{2705}" } else { "\u{274C}" };
        let version = match &tool.version {
            Some(version) => version.green().to_string(),
            None => "not found".red().to_string(),
        };
        help.push_str(&format!("  {} {:<10} {}\n", icon, tool.name, version));
    }
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_list_with_default_config() {
        let cli = Cli::parse_from(["tsb", "list"]);
        assert!(matches!(cli.command, Command::List));
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
    }

    #[test]
    fn test_cli_parse_run_many() {
        let cli = Cli::parse_from(["tsb", "--config", "other.yml", "run", "lib:build", "lib:dist"]);
        assert_eq!(cli.config, PathBuf::from("other.yml"));
        let Command::Run { tasks } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(tasks, vec!["lib:build", "lib:dist"]);
    }

    #[test]
    fn test_cli_run_requires_a_task() {
        assert!(Cli::try_parse_from(["tsb", "run"]).is_err());
    }

    #[test]
    fn test_cli_parse_next_version() {
        let cli = Cli::parse_from(["tsb", "-l", "debug", "next-version", "minor"]);
        assert!(matches!(cli.command, Command::NextVersion { kind: BumpKind::Minor }));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("git version 2.43.0"), "2.43.0");
        assert_eq!(parse_version("v20.11.1\n"), "20.11.1");
        assert_eq!(parse_version("Version 5.4.5"), "5.4.5");
        assert_eq!(parse_version("nothing here"), "unknown");
    }
}
