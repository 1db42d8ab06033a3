//! Task error types

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::glob::GlobError;
use crate::vcs::GitError;

/// A delegated subprocess that did not exit cleanly
#[derive(Debug, Clone)]
pub struct ProcessFailure {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Exit code, when the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, when killed by one
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessFailure {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ", self.command_line())?;
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exited with code {}", code)?,
            (None, Some(signal)) => write!(f, "was terminated by signal {}", signal)?,
            (None, None) => write!(f, "terminated abnormally")?,
        }
        if !self.stderr.trim().is_empty() {
            write!(f, "\n{}", self.stderr.trim_end())?;
        } else if !self.stdout.trim().is_empty() {
            write!(f, "\n{}", self.stdout.trim_end())?;
        }
        Ok(())
    }
}

/// Errors surfaced by task functions
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Tool(Box<ProcessFailure>),

    #[error("Tests failed: {0}")]
    Test(Box<ProcessFailure>),

    #[error("Coverage run failed: {0}")]
    Coverage(Box<ProcessFailure>),

    #[error("Publish failed: {0}")]
    Publish(Box<ProcessFailure>),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not a JSON object")]
    NotAnObject { path: PathBuf },

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Watching requires a running tokio runtime")]
    NoRuntime,

    #[error("Failed to wait for Ctrl-C: {0}")]
    Signal(#[source] std::io::Error),
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The failed subprocess, for process-backed variants
    pub fn process_failure(&self) -> Option<&ProcessFailure> {
        match self {
            Self::Tool(failure) | Self::Test(failure) | Self::Coverage(failure) | Self::Publish(failure) => {
                Some(failure)
            }
            _ => None,
        }
    }
}
