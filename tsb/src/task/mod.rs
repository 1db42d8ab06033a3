//! Task generators
//!
//! Every generator is a plain function from a resolved options value to a
//! [`TaskFn`] (and, where it makes sense, a [`WatchFn`]). Generators know
//! nothing about each other; target orchestrators compose them.

mod build_scripts;
mod clean;
mod copy;
mod error;
mod lint;
mod mocha;
mod npm_publish;
mod package_json;
mod process;
mod publish_branch;
mod render;
mod tsconfig_json;
mod typedoc;
mod webpack;

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::watch::WatchHandle;

pub use build_scripts::{BuildScriptsOptions, build_scripts};
pub use clean::{CleanSpec, clean};
pub use copy::{CopyOperation, copy, copy_group};
pub use error::{ProcessFailure, TaskError};
pub use lint::{LintOptions, lint};
pub use mocha::{CoverageOptions, MochaOptions, coverage, mocha};
pub use npm_publish::{NpmPublishOptions, npm_publish};
pub use package_json::{DistPackageJsonOptions, PackageJsonMap, dist_package_json, read_json, write_json};
pub use process::{Invocation, OutputMode, run_tool};
pub use publish_branch::{BranchPublishOptions, publish_to_branch};
pub use render::{RenderKind, RenderOperation, render_group};
pub use tsconfig_json::{TsLocations, TsconfigJson, tsconfig_json, write_tsconfig_json};
pub use typedoc::{TypedocTaskOptions, typedoc};
pub use webpack::{WebpackOptions, webpack};

/// Future returned by a task
pub type TaskFuture = BoxFuture<'static, Result<(), TaskError>>;

/// A task body; calling it starts one run
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Starts watchers that re-run some task on change
pub type WatchFn = Arc<dyn Fn() -> Result<Vec<WatchHandle>, TaskError> + Send + Sync>;

/// Wrap an async closure as a [`TaskFn`]
pub fn task_fn<F, Fut>(f: F) -> TaskFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Run several task bodies concurrently, failing on the first error
pub fn join_tasks(tasks: Vec<TaskFn>) -> TaskFn {
    task_fn(move || {
        let runs: Vec<TaskFuture> = tasks.iter().map(|task| task()).collect();
        async move {
            futures::future::try_join_all(runs).await?;
            Ok(())
        }
    })
}

/// Combine watch functions into one that starts all of them
pub fn join_watchers(watchers: Vec<WatchFn>) -> WatchFn {
    Arc::new(move || {
        let mut handles = Vec::new();
        for watcher in &watchers {
            handles.extend(watcher()?);
        }
        Ok(handles)
    })
}
