//! mocha / coverage - spawn the test runner over compiled specs

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Invocation, OutputMode, TaskError, TaskFn, run_tool, task_fn};
use crate::glob::{self, MatcherPattern};

/// Test runner inputs
#[derive(Debug, Clone)]
pub struct MochaOptions {
    pub mocha: String,
    /// Working directory of the runner
    pub cwd: PathBuf,
    pub build_dir: PathBuf,
    /// Anchored spec patterns
    pub specs: Vec<MatcherPattern>,
    pub reporter: String,
    pub colors: bool,
}

impl MochaOptions {
    /// Defaults: `**/*.spec.js` under `build_dir`, `spec` reporter, colors on
    pub fn new(mocha: impl Into<String>, cwd: PathBuf, build_dir: PathBuf) -> Self {
        let specs = glob::join_all(&build_dir, &["**/*.spec.js"]);
        Self {
            mocha: mocha.into(),
            cwd,
            build_dir,
            specs,
            reporter: "spec".to_string(),
            colors: true,
        }
    }

    /// Switch the spec glob to the ES module variant
    pub fn with_esm_specs(mut self) -> Self {
        self.specs = glob::join_all(&self.build_dir, &["**/*.spec.mjs"]);
        self
    }

    /// Runner arguments, without the program name
    pub fn runner_args(&self, files: &[PathBuf]) -> Vec<String> {
        let colors = if self.colors { "--colors" } else { "--no-colors" };
        ["--reporter", self.reporter.as_str(), colors]
            .into_iter()
            .map(str::to_string)
            .chain(files.iter().map(|file| glob::to_posix(file)))
            .collect()
    }

    /// Matched spec files; when nothing matches, the positive patterns
    /// themselves so the runner reports the empty set and fails
    fn spec_files(&self) -> Result<Vec<PathBuf>, TaskError> {
        let files = glob::expand(&self.specs)?;
        if files.is_empty() {
            warn!(build_dir = ?self.build_dir, "No spec files found, passing the patterns to the runner");
            return Ok(self
                .specs
                .iter()
                .filter(|pattern| !pattern.negated && !pattern.is_comment() && !pattern.is_empty())
                .map(|pattern| PathBuf::from(&pattern.glob))
                .collect());
        }
        Ok(files)
    }
}

/// Coverage inputs; wraps a mocha run
#[derive(Debug, Clone)]
pub struct CoverageOptions {
    pub nyc: String,
    pub report_dir: PathBuf,
    pub reporters: Vec<String>,
    pub mocha: MochaOptions,
}

impl CoverageOptions {
    pub fn new(nyc: impl Into<String>, report_dir: PathBuf, mocha: MochaOptions) -> Self {
        Self {
            nyc: nyc.into(),
            report_dir,
            reporters: vec!["text".to_string(), "lcov".to_string()],
            mocha,
        }
    }

    fn invocation(&self, files: &[PathBuf]) -> Invocation {
        Invocation::new(&self.nyc)
            .args(self.reporters.iter().map(|reporter| format!("--reporter={}", reporter)))
            .arg("--report-dir")
            .path_arg(&self.report_dir)
            .arg(&self.mocha.mocha)
            .args(self.mocha.runner_args(files))
            .cwd(&self.mocha.cwd)
            .output(OutputMode::Echo)
    }
}

fn mocha_invocation(options: &MochaOptions, files: &[PathBuf]) -> Invocation {
    Invocation::new(&options.mocha)
        .args(options.runner_args(files))
        .cwd(&options.cwd)
        .output(OutputMode::Echo)
}

/// Task running the specs; a non-zero exit is [`TaskError::Test`]
pub fn mocha(options: MochaOptions) -> TaskFn {
    debug!(build_dir = ?options.build_dir, reporter = %options.reporter, "mocha: called");
    let options = Arc::new(options);
    task_fn(move || {
        let options = options.clone();
        async move {
            let files = options.spec_files()?;
            run_tool(&mocha_invocation(&options, &files), TaskError::Test).await?;
            info!(count = files.len(), "Tests passed");
            Ok(())
        }
    })
}

/// Task running the specs under coverage; a non-zero exit is [`TaskError::Coverage`]
pub fn coverage(options: CoverageOptions) -> TaskFn {
    debug!(report_dir = ?options.report_dir, "coverage: called");
    let options = Arc::new(options);
    task_fn(move || {
        let options = options.clone();
        async move {
            let files = options.mocha.spec_files()?;
            run_tool(&options.invocation(&files), TaskError::Coverage).await?;
            info!(report_dir = ?options.report_dir, "Coverage report written");
            Ok(())
        }
    })
}
