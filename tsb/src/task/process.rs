//! Subprocess invocation for delegated tools

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ProcessFailure, TaskError};

/// How a subprocess' output is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Capture stdout/stderr silently
    #[default]
    Captured,
    /// Capture, then replay the output on our own stdout/stderr
    Echo,
    /// Share our stdout/stderr; nothing is captured
    Inherit,
}

/// A command line to run
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub output: OutputMode,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            output: OutputMode::default(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    fn failure(&self, status: ExitStatus, stdout: String, stderr: String) -> ProcessFailure {
        ProcessFailure {
            program: self.program.clone(),
            args: self.args.clone(),
            cwd: self.cwd.clone(),
            code: status.code(),
            signal: exit_signal(status),
            stdout,
            stderr,
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Run a tool to completion; a non-zero exit is wrapped with `wrap`
///
/// Returns captured stdout on success (empty for [`OutputMode::Inherit`]).
pub async fn run_tool(
    invocation: &Invocation,
    wrap: fn(Box<ProcessFailure>) -> TaskError,
) -> Result<String, TaskError> {
    debug!(program = %invocation.program, args = ?invocation.args, cwd = ?invocation.cwd, "run_tool: called");
    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args);
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }

    let spawn_error = |source: std::io::Error| TaskError::Spawn {
        program: invocation.program.clone(),
        source,
    };

    if invocation.output == OutputMode::Inherit {
        command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
        let status = command.status().await.map_err(spawn_error)?;
        debug!(?status, "run_tool: inherited process exited");
        if !status.success() {
            return Err(wrap(Box::new(invocation.failure(status, String::new(), String::new()))));
        }
        return Ok(String::new());
    }

    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(spawn_error)?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    debug!(status = ?output.status, stdout_len = stdout.len(), stderr_len = stderr.len(), "run_tool: process exited");

    if invocation.output == OutputMode::Echo {
        // Replay failures are not worth failing the task over
        let _ = tokio::io::stdout().write_all(stdout.as_bytes()).await;
        let _ = tokio::io::stderr().write_all(stderr.as_bytes()).await;
    }

    if !output.status.success() {
        return Err(wrap(Box::new(invocation.failure(output.status, stdout, stderr))));
    }

    info!("{} finished", invocation.program);
    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_tool_success_returns_stdout() {
        let temp = tempdir().unwrap();
        let inv = Invocation::new("sh").args(["-c", "echo hello"]).cwd(temp.path());

        let stdout = run_tool(&inv, TaskError::Tool).await.unwrap();
        assert_eq!(stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_tool_failure_carries_buffers() {
        let inv = Invocation::new("sh").args(["-c", "echo out; echo err >&2; exit 4"]);

        let err = run_tool(&inv, TaskError::Test).await.unwrap_err();
        let TaskError::Test(failure) = err else {
            panic!("expected a test failure");
        };
        assert_eq!(failure.code, Some(4));
        assert_eq!(failure.stdout.trim(), "out");
        assert_eq!(failure.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_run_tool_runs_in_cwd() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("marker"), "x").unwrap();
        let inv = Invocation::new("sh").args(["-c", "ls"]).cwd(temp.path());

        let stdout = run_tool(&inv, TaskError::Tool).await.unwrap();
        assert!(stdout.contains("marker"));
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let inv = Invocation::new("definitely-not-a-real-program-tsb");
        let err = run_tool(&inv, TaskError::Tool).await.unwrap_err();
        assert!(matches!(err, TaskError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_signal() {
        let inv = Invocation::new("sh").args(["-c", "kill -9 $$"]);
        let err = run_tool(&inv, TaskError::Tool).await.unwrap_err();
        let failure = err.process_failure().unwrap();
        assert_eq!(failure.code, None);
        assert_eq!(failure.signal, Some(9));
    }
}
