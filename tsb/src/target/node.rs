//! Node program targets

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::common::{register_base, register_watch};
use super::{FsProbe, ResolvedTargetBase, TargetBase, resolve_target_base};
use crate::config::ConfigError;
use crate::engine::{EngineError, TaskRegistry};
use crate::project::ResolvedProject;
use crate::task::{Invocation, OutputMode, TaskError, TaskFn, run_tool, task_fn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeTarget {
    #[serde(flatten)]
    pub base: TargetBase,

    /// Entry module relative to the build dir, without extension
    #[serde(default)]
    pub main_module: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNodeTarget {
    pub base: ResolvedTargetBase,
    pub main_module: String,
}

pub fn resolve_node_target(
    project: &ResolvedProject,
    target: &NodeTarget,
    fs: &dyn FsProbe,
) -> Result<ResolvedNodeTarget, ConfigError> {
    debug!(name = %target.base.name, "resolve_node_target: called");
    let main_module = target.main_module.clone().ok_or_else(|| ConfigError::MissingField {
        target: target.base.name.clone(),
        field: "main-module",
    })?;
    Ok(ResolvedNodeTarget {
        base: resolve_target_base(project, &target.base, fs)?,
        main_module,
    })
}

/// Task running the built entry module with inherited stdio
pub(super) fn run_main(base: &ResolvedTargetBase, main_module: &str) -> TaskFn {
    let entry = base.build_dir.join(format!("{}.js", main_module));
    let invocation = Invocation::new(&base.tools.node)
        .path_arg(&entry)
        .cwd(&base.project.root)
        .output(OutputMode::Inherit);
    task_fn(move || {
        let invocation = invocation.clone();
        async move {
            run_tool(&invocation, TaskError::Tool).await?;
            info!(program = %invocation.program, args = ?invocation.args, "Program exited");
            Ok(())
        }
    })
}

/// Register `:build`, `:clean`, `:run`, `:watch`, `:tsconfig.json` and the
/// `<name>` shorthand (clean, build, run)
pub fn register_node_target(registry: &mut TaskRegistry, target: &ResolvedNodeTarget) -> Result<(), EngineError> {
    debug!(name = %target.base.name, "register_node_target: called");
    let base = &target.base;
    let (handles, watchers) = register_base(registry, base)?;

    let mut parts = vec![&handles.scripts];
    parts.extend(handles.assets());
    let build = registry.parallel(base.task_name("build"), &parts)?;

    let run = registry.task(base.task_name("run"), &[], run_main(base, &target.main_module))?;
    registry.series(base.task_name(""), &[&handles.clean, &build, &run])?;
    register_watch(registry, base, &build, watchers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::StubFs;
    use super::*;
    use crate::project::{Project, resolve_project};

    fn project() -> ResolvedProject {
        resolve_project(&Project::new("/proj")).unwrap()
    }

    #[test]
    fn test_main_module_is_required() {
        let target = NodeTarget {
            base: TargetBase::new("server"),
            main_module: None,
        };
        let err = resolve_node_target(&project(), &target, &StubFs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "main-module", .. }));
    }

    #[test]
    fn test_task_names_and_start_sequence() {
        let target = NodeTarget {
            base: TargetBase::new("server"),
            main_module: Some("main".to_string()),
        };
        let resolved = resolve_node_target(&project(), &target, &StubFs::default()).unwrap();
        let mut registry = TaskRegistry::new();
        register_node_target(&mut registry, &resolved).unwrap();

        assert_eq!(
            registry.names(),
            vec![
                "server",
                "server:build",
                "server:build:copy",
                "server:build:scripts",
                "server:clean",
                "server:run",
                "server:tsconfig.json",
                "server:watch",
            ]
        );
        assert_eq!(
            registry.execution_order("server").unwrap(),
            vec![
                "server:clean",
                "server:build:scripts",
                "server:build:copy",
                "server:build",
                "server:run",
                "server",
            ]
        );
        assert_eq!(registry.predecessors("server:watch").unwrap(), vec!["server:build"]);
    }

    #[test]
    fn test_deserialize_flattened_base() {
        let target: NodeTarget = serde_yaml::from_str("name: server\nmain-module: main\nsrc-dir: src/server\n").unwrap();
        assert_eq!(target.base.name, "server");
        assert_eq!(target.main_module.as_deref(), Some("main"));
    }
}
