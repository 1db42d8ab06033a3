//! Test suite targets

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::common::{register_base, register_watch};
use super::{FsProbe, ResolvedTargetBase, TargetBase, resolve_target_base};
use crate::config::ConfigError;
use crate::engine::{EngineError, TaskRegistry};
use crate::project::ResolvedProject;
use crate::task::{CoverageOptions, MochaOptions, coverage, mocha};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MochaTarget {
    #[serde(flatten)]
    pub base: TargetBase,

    #[serde(default)]
    pub reporter: Option<String>,

    #[serde(default)]
    pub colors: Option<bool>,

    /// Run `*.spec.mjs` instead of `*.spec.js`
    #[serde(default)]
    pub esm: bool,

    /// Relative to the project root; `<build-dir>/<name>.coverage` by default
    #[serde(default)]
    pub coverage_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedMochaTarget {
    pub base: ResolvedTargetBase,
    pub mocha: MochaOptions,
    pub coverage: CoverageOptions,
}

pub fn resolve_mocha_target(
    project: &ResolvedProject,
    target: &MochaTarget,
    fs: &dyn FsProbe,
) -> Result<ResolvedMochaTarget, ConfigError> {
    debug!(name = %target.base.name, "resolve_mocha_target: called");
    let base = resolve_target_base(project, &target.base, fs)?;

    let mut mocha = MochaOptions::new(&base.tools.mocha, project.root.clone(), base.build_dir.clone());
    if target.esm {
        mocha = mocha.with_esm_specs();
    }
    if let Some(reporter) = &target.reporter {
        mocha.reporter = reporter.clone();
    }
    if let Some(colors) = target.colors {
        mocha.colors = colors;
    }

    let report_dir = target
        .coverage_dir
        .as_ref()
        .map(|dir| project.absolute(dir))
        .unwrap_or_else(|| project.build_dir.join(format!("{}.coverage", base.name)));
    let coverage = CoverageOptions::new(&base.tools.nyc, report_dir, mocha.clone());

    Ok(ResolvedMochaTarget { base, mocha, coverage })
}

/// Register the shared tasks plus `:run`, `:coverage` and `<name>`
pub fn register_mocha_target(registry: &mut TaskRegistry, target: &ResolvedMochaTarget) -> Result<(), EngineError> {
    debug!(name = %target.base.name, "register_mocha_target: called");
    let base = &target.base;
    let (handles, watchers) = register_base(registry, base)?;

    let mut parts = vec![&handles.scripts];
    parts.extend(handles.assets());
    let build = registry.parallel(base.task_name("build"), &parts)?;

    let run = registry.task(base.task_name("run"), &[], mocha(target.mocha.clone()))?;
    registry.task(base.task_name("coverage"), &[&build], coverage(target.coverage.clone()))?;
    registry.series(base.task_name(""), &[&handles.clean, &build, &run])?;
    register_watch(registry, base, &build, watchers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::StubFs;
    use super::*;
    use crate::project::{Project, resolve_project};

    #[test]
    fn test_resolve_defaults_and_overrides() {
        let project = resolve_project(&Project::new("/proj")).unwrap();
        let target = MochaTarget {
            base: TargetBase {
                src_dir: Some(PathBuf::from("src/test")),
                ..TargetBase::new("test")
            },
            reporter: Some("dot".to_string()),
            esm: true,
            ..Default::default()
        };
        let resolved = resolve_mocha_target(&project, &target, &StubFs::default()).unwrap();

        assert_eq!(resolved.mocha.build_dir, PathBuf::from("/proj/build/test"));
        assert_eq!(resolved.mocha.reporter, "dot");
        assert!(resolved.mocha.colors);
        assert_eq!(resolved.mocha.specs[0].as_string(), "/proj/build/test/**/*.spec.mjs");
        assert_eq!(resolved.coverage.report_dir, PathBuf::from("/proj/build/test.coverage"));
    }

    #[test]
    fn test_task_graph() {
        let project = resolve_project(&Project::new("/proj")).unwrap();
        let target = MochaTarget {
            base: TargetBase::new("test"),
            ..Default::default()
        };
        let resolved = resolve_mocha_target(&project, &target, &StubFs::default()).unwrap();
        let mut registry = TaskRegistry::new();
        register_mocha_target(&mut registry, &resolved).unwrap();

        for name in ["test", "test:run", "test:coverage", "test:build", "test:clean", "test:watch"] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert_eq!(registry.predecessors("test:coverage").unwrap(), vec!["test:build"]);
        assert_eq!(
            registry.execution_order("test").unwrap(),
            vec![
                "test:clean",
                "test:build:scripts",
                "test:build:copy",
                "test:build",
                "test:run",
                "test",
            ]
        );
    }
}
