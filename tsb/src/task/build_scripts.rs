//! build-typescript - compile scripts with the delegated compiler

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::{Invocation, TaskError, TaskFn, WatchFn, run_tool, task_fn};
use crate::glob::{self, MatcherPattern};
use crate::options::{CompilerOptions, Merge};
use crate::watch;

/// Inputs of a compilation
#[derive(Debug, Clone)]
pub struct BuildScriptsOptions {
    /// Compiler executable
    pub tsc: String,
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Anchored script patterns
    pub scripts: Vec<MatcherPattern>,
    pub compiler_options: CompilerOptions,
    pub type_roots: Vec<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileProject {
    compiler_options: CompilerOptions,
    files: Vec<String>,
}

impl BuildScriptsOptions {
    /// Options with the absolute locations of this compilation stamped in
    pub fn located_options(&self) -> CompilerOptions {
        self.compiler_options.merge(&CompilerOptions {
            root_dir: Some(glob::to_posix(&self.src_dir)),
            out_dir: Some(glob::to_posix(&self.out_dir)),
            type_roots: Some(self.type_roots.iter().map(|root| glob::to_posix(root)).collect()),
            ..Default::default()
        })
    }
}

async fn compile(options: &BuildScriptsOptions) -> Result<(), TaskError> {
    let files = glob::expand(&options.scripts)?;
    if files.is_empty() {
        info!(src_dir = ?options.src_dir, "No scripts matched, nothing to compile");
        return Ok(());
    }

    let project = CompileProject {
        compiler_options: options.located_options(),
        files: files.iter().map(|file| glob::to_posix(file)).collect(),
    };

    // Removed on drop, whichever way this function exits
    let scratch = tempfile::Builder::new()
        .prefix("tsb-tsc-")
        .tempdir()
        .map_err(|e| TaskError::io(std::env::temp_dir(), e))?;
    let project_path = scratch.path().join("tsconfig.json");
    let content = serde_json::to_string_pretty(&project).map_err(|source| TaskError::Json {
        path: project_path.clone(),
        source,
    })?;
    tokio::fs::write(&project_path, content)
        .await
        .map_err(|e| TaskError::io(&project_path, e))?;

    let invocation = Invocation::new(&options.tsc)
        .arg("--project")
        .path_arg(&project_path)
        .cwd(&options.src_dir);
    run_tool(&invocation, TaskError::Tool).await?;

    info!(count = files.len(), out_dir = ?options.out_dir, "Compiled scripts");
    Ok(())
}

/// Compile task and a watcher recompiling on script changes
pub fn build_scripts(options: BuildScriptsOptions) -> (TaskFn, WatchFn) {
    debug!(src_dir = ?options.src_dir, out_dir = ?options.out_dir, "build_scripts: called");
    let options = Arc::new(options);
    let task = {
        let options = options.clone();
        task_fn(move || {
            let options = options.clone();
            async move { compile(&options).await }
        })
    };
    let watcher = watch::watch_task(options.src_dir.clone(), options.scripts.clone(), task.clone());
    (task, watcher)
}
