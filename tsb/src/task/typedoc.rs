//! typedoc - generate API documentation

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::{Invocation, TaskError, TaskFn, run_tool, task_fn};

#[derive(Debug, Clone, PartialEq)]
pub struct TypedocTaskOptions {
    pub typedoc: String,
    pub out_dir: PathBuf,
    pub tsconfig: PathBuf,
    /// Project name shown in the docs
    pub name: String,
    pub src_dir: PathBuf,
}

impl TypedocTaskOptions {
    fn invocation(&self) -> Invocation {
        Invocation::new(&self.typedoc)
            .arg("--out")
            .path_arg(&self.out_dir)
            .arg("--tsconfig")
            .path_arg(&self.tsconfig)
            .arg("--name")
            .arg(&self.name)
            .path_arg(&self.src_dir)
            .cwd(&self.src_dir)
    }
}

pub fn typedoc(options: TypedocTaskOptions) -> TaskFn {
    debug!(out_dir = ?options.out_dir, name = %options.name, "typedoc: called");
    let options = Arc::new(options);
    task_fn(move || {
        let options = options.clone();
        async move {
            run_tool(&options.invocation(), TaskError::Tool).await?;
            info!(out_dir = ?options.out_dir, "Generated documentation");
            Ok(())
        }
    })
}
