//! tsbuild - target resolution and task-graph generation for TypeScript projects
//!
//! A project descriptor plus a list of target descriptors is resolved into
//! absolute locations and merged tool options, then turned into a graph of
//! named tasks that delegate to the usual tools (`tsc`, `tslint`, `webpack`,
//! `mocha`, `typedoc`, `npm`, `git`).
//!
//! # Modules
//!
//! - [`glob`] - anchored, negation-aware glob patterns
//! - [`options`] - compiler and lint option presets and layering
//! - [`project`] / [`target`] - descriptors and their resolution
//! - [`task`] - task generators, one per delegated operation
//! - [`engine`] - task registry and executor
//! - [`project_tasks`] - project-wide lint, config emission and release tasks
//! - [`version`] - version bumps and the release protocol
//! - [`vcs`] - git operations behind the [`vcs::Vcs`] trait
//! - [`watch`] - debounced file watching
//! - [`config`] - the `tsbuild.yml` descriptor file
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod engine;
pub mod glob;
pub mod options;
pub mod project;
pub mod project_tasks;
pub mod target;
pub mod task;
pub mod vcs;
pub mod version;
pub mod watch;

use std::sync::Arc;

pub use config::{BuildConfig, ConfigError};
pub use engine::{EngineError, TaskHandle, TaskRegistry};
pub use project::{Project, ResolvedProject, resolve_project};
pub use target::{FsProbe, RealFs, TargetConfig, register_target};
pub use task::{TaskError, TaskFn};
pub use vcs::{GitCli, GitError, Vcs};
pub use version::{BumpKind, ReleaseOptions};

/// Resolve a loaded descriptor and register every project and target task
pub fn build_registry(config: &BuildConfig, fs: &dyn FsProbe, vcs: Arc<dyn Vcs>) -> Result<TaskRegistry, EngineError> {
    tracing::debug!(targets = config.targets.len(), "build_registry: called");
    let project = resolve_project(&config.project)?;
    let mut registry = TaskRegistry::new();
    project_tasks::register_project_tasks(&mut registry, &project, &config.tools, &config.release, vcs.clone())?;
    for target in &config.targets {
        register_target(&mut registry, &project, target, fs, vcs.clone())?;
    }
    Ok(registry)
}
