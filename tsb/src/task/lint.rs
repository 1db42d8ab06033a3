//! lint - run the delegated linter over a source set

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::{Invocation, OutputMode, TaskError, TaskFn, read_json, run_tool, task_fn};
use crate::glob::{self, MatcherPattern};
use crate::options::{DEFAULT_TSLINT, TslintConfig};

/// Lint inputs
///
/// The effective rule set is `base`, extended by the file at `user_config`
/// (if any), extended by `inline`.
#[derive(Debug, Clone)]
pub struct LintOptions {
    pub tslint: String,
    pub cwd: PathBuf,
    /// Anchored source patterns
    pub files: Vec<MatcherPattern>,
    pub base: TslintConfig,
    pub user_config: Option<PathBuf>,
    pub inline: TslintConfig,
    /// Rewrite files in place
    pub fix: bool,
}

impl LintOptions {
    pub fn new(tslint: impl Into<String>, cwd: PathBuf, files: Vec<MatcherPattern>) -> Self {
        Self {
            tslint: tslint.into(),
            cwd,
            files,
            base: DEFAULT_TSLINT.clone(),
            user_config: None,
            inline: TslintConfig::default(),
            fix: false,
        }
    }

    /// Load the user file and fold every layer into one configuration
    pub async fn merged_config(&self) -> Result<TslintConfig, TaskError> {
        debug!(user_config = ?self.user_config, "LintOptions::merged_config: called");
        let mut config = self.base.clone();
        if let Some(path) = &self.user_config {
            let value = read_json(path).await?;
            let user: TslintConfig = serde_json::from_value(value).map_err(|source| TaskError::Json {
                path: path.clone(),
                source,
            })?;
            config = config.extend(&user);
        }
        Ok(config.extend(&self.inline))
    }
}

async fn run_lint(options: &LintOptions) -> Result<(), TaskError> {
    let files = glob::expand(&options.files)?;
    if files.is_empty() {
        info!(cwd = ?options.cwd, "No sources matched, nothing to lint");
        return Ok(());
    }

    let config = options.merged_config().await?;
    let rendered = config.to_pretty_json().map_err(|source| TaskError::Json {
        path: options.cwd.join("tslint.json"),
        source,
    })?;

    // Removed on drop
    let scratch = tempfile::Builder::new()
        .prefix("tsb-tslint-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| TaskError::io(std::env::temp_dir(), e))?;
    tokio::fs::write(scratch.path(), rendered)
        .await
        .map_err(|e| TaskError::io(scratch.path(), e))?;

    let mut invocation = Invocation::new(&options.tslint)
        .arg("--config")
        .path_arg(scratch.path())
        .args(["--format", "verbose"])
        .cwd(&options.cwd)
        .output(OutputMode::Echo);
    if options.fix {
        invocation = invocation.arg("--fix");
    }
    let invocation = invocation.args(files.iter().map(|file| glob::to_posix(file)));

    run_tool(&invocation, TaskError::Tool).await?;
    info!(count = files.len(), fix = options.fix, "Lint passed");
    Ok(())
}

/// Task linting (or, with `fix`, formatting) the matched sources
pub fn lint(options: LintOptions) -> TaskFn {
    debug!(cwd = ?options.cwd, fix = options.fix, "lint: called");
    let options = Arc::new(options);
    task_fn(move || {
        let options = options.clone();
        async move { run_lint(&options).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_merged_config_layers_user_file_then_inline() {
        let temp = tempdir().unwrap();
        let user = temp.path().join("tslint.json");
        fs::write(
            &user,
            r#"{"extends": ["tslint-plugin"], "rules": {"curly": false, "no-console": true}}"#,
        )
        .unwrap();

        let mut options = LintOptions::new("tslint", temp.path().to_path_buf(), vec![]);
        options.user_config = Some(user);
        options.inline.rules.insert("no-console".to_string(), json!(false));

        let merged = options.merged_config().await.unwrap();
        assert_eq!(merged.rules["curly"], json!(false));
        assert_eq!(merged.rules["no-console"], json!(false));
        assert_eq!(merged.rules["semicolon"], DEFAULT_TSLINT.rules["semicolon"]);
        assert_eq!(merged.extends, vec!["tslint-plugin"]);
    }

    #[tokio::test]
    async fn test_lint_failure_propagates() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.ts"), "var x = 1").unwrap();
        let options = LintOptions::new("false", temp.path().to_path_buf(), glob::join_all(temp.path(), &["*.ts"]));

        let err = lint(options)().await.unwrap_err();
        assert!(matches!(err, TaskError::Tool(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lint_passes_fix_flag_and_files() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.ts"), "").unwrap();
        let log = temp.path().join("args.txt");
        let script = temp.path().join("fake-tslint.sh");
        fs::write(&script, format!("#!/bin/sh\necho \"$@\" > {}\n", log.display())).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut options = LintOptions::new(
            script.to_string_lossy(),
            temp.path().to_path_buf(),
            glob::join_all(temp.path(), &["*.ts"]),
        );
        options.fix = true;
        lint(options)().await.unwrap();

        let args = fs::read_to_string(&log).unwrap();
        assert!(args.contains("--format verbose --fix"));
        assert!(args.trim_end().ends_with("a.ts"));
    }
}
