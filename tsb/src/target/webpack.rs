//! Webpack bundle targets

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::common::{register_base, register_watch};
use super::{FsProbe, ResolvedTargetBase, TargetBase, resolve_target_base};
use crate::config::ConfigError;
use crate::engine::{EngineError, TaskRegistry};
use crate::glob;
use crate::project::ResolvedProject;
use crate::task::{WebpackOptions, webpack};
use crate::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebpackTarget {
    #[serde(flatten)]
    pub base: TargetBase,

    #[serde(default)]
    pub main_module: Option<String>,

    /// Relative to the project root; `<build-dir>/<name>.webpack` by default
    #[serde(default)]
    pub webpack_dir: Option<PathBuf>,

    #[serde(default)]
    pub bundle: Option<String>,

    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWebpackTarget {
    pub base: ResolvedTargetBase,
    pub webpack: WebpackOptions,
}

pub fn resolve_webpack_target(
    project: &ResolvedProject,
    target: &WebpackTarget,
    fs: &dyn FsProbe,
) -> Result<ResolvedWebpackTarget, ConfigError> {
    debug!(name = %target.base.name, "resolve_webpack_target: called");
    let main_module = target.main_module.clone().ok_or_else(|| ConfigError::MissingField {
        target: target.base.name.clone(),
        field: "main-module",
    })?;
    let mut base = resolve_target_base(project, &target.base, fs)?;

    let webpack_dir = target
        .webpack_dir
        .as_ref()
        .map(|dir| project.absolute(dir))
        .unwrap_or_else(|| project.build_dir.join(format!("{}.webpack", base.name)));
    let explicit_clean_dirs = target.base.clean.as_ref().is_some_and(|clean| clean.dirs.is_some());
    if !explicit_clean_dirs {
        base.clean.dirs.push(webpack_dir.clone());
    }

    let webpack = WebpackOptions {
        webpack: base.tools.webpack.clone(),
        build_dir: base.build_dir.clone(),
        main_module,
        webpack_dir,
        bundle: target.bundle.clone().unwrap_or_else(|| "bundle.js".to_string()),
        mode: target.mode.clone().unwrap_or_else(|| "development".to_string()),
    };
    Ok(ResolvedWebpackTarget { base, webpack })
}

/// Register the shared tasks plus `:build:webpack`, which runs strictly after
/// `:build:scripts`
pub fn register_webpack_target(registry: &mut TaskRegistry, target: &ResolvedWebpackTarget) -> Result<(), EngineError> {
    debug!(name = %target.base.name, "register_webpack_target: called");
    let base = &target.base;
    let (handles, mut watchers) = register_base(registry, base)?;

    let bundle_task = webpack(target.webpack.clone());
    watchers.push(watch::watch_task(
        base.build_dir.clone(),
        glob::join_all(&base.build_dir, &["**/*.js"]),
        bundle_task.clone(),
    ));
    let bundle = registry.task(base.task_name("build:webpack"), &[&handles.scripts], bundle_task)?;

    let mut parts = vec![&bundle];
    parts.extend(handles.assets());
    let build = registry.parallel(base.task_name("build"), &parts)?;
    register_watch(registry, base, &build, watchers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::StubFs;
    use super::super::AssetOptions;
    use super::*;
    use crate::project::{Project, resolve_project};

    fn resolved() -> ResolvedWebpackTarget {
        let project = resolve_project(&Project::new("/proj")).unwrap();
        let target = WebpackTarget {
            base: TargetBase {
                sass: vec![AssetOptions::default()],
                ..TargetBase::new("app")
            },
            main_module: Some("main".to_string()),
            ..Default::default()
        };
        resolve_webpack_target(&project, &target, &StubFs::default()).unwrap()
    }

    #[test]
    fn test_resolve_defaults() {
        let target = resolved();
        assert_eq!(target.webpack.webpack_dir, PathBuf::from("/proj/build/app.webpack"));
        assert_eq!(target.webpack.entry(), PathBuf::from("/proj/build/app/main.js"));
        assert_eq!(target.webpack.bundle, "bundle.js");
        assert_eq!(
            target.base.clean.dirs,
            vec![PathBuf::from("/proj/build/app"), PathBuf::from("/proj/build/app.webpack")]
        );
    }

    #[test]
    fn test_webpack_runs_after_scripts() {
        let mut registry = TaskRegistry::new();
        register_webpack_target(&mut registry, &resolved()).unwrap();

        assert_eq!(registry.predecessors("app:build:webpack").unwrap(), vec!["app:build:scripts"]);
        assert_eq!(
            registry.execution_order("app:build").unwrap(),
            vec![
                "app:build:scripts",
                "app:build:webpack",
                "app:build:copy",
                "app:build:sass",
                "app:build",
            ]
        );
        assert!(!registry.contains("app:build:pug"));
    }
}
