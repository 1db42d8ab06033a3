//! webpack - bundle the compiler's output

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::{Invocation, OutputMode, TaskError, TaskFn, run_tool, task_fn};

#[derive(Debug, Clone, PartialEq)]
pub struct WebpackOptions {
    pub webpack: String,
    pub build_dir: PathBuf,
    /// Entry module relative to `build_dir`, without extension
    pub main_module: String,
    pub webpack_dir: PathBuf,
    pub bundle: String,
    /// `development` or `production`
    pub mode: String,
}

impl WebpackOptions {
    pub fn entry(&self) -> PathBuf {
        self.build_dir.join(format!("{}.js", self.main_module))
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(&self.webpack)
            .arg("--entry")
            .path_arg(&self.entry())
            .arg("--output-path")
            .path_arg(&self.webpack_dir)
            .arg("--output-filename")
            .arg(&self.bundle)
            .arg("--mode")
            .arg(&self.mode)
            .cwd(&self.build_dir)
            .output(OutputMode::Echo)
    }
}

pub fn webpack(options: WebpackOptions) -> TaskFn {
    debug!(entry = ?options.entry(), webpack_dir = ?options.webpack_dir, "webpack: called");
    let options = Arc::new(options);
    task_fn(move || {
        let options = options.clone();
        async move {
            run_tool(&options.invocation(), TaskError::Tool).await?;
            info!(bundle = %options.bundle, webpack_dir = ?options.webpack_dir, "Bundled");
            Ok(())
        }
    })
}
