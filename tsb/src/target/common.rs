//! Tasks shared by every target kind

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::ResolvedTargetBase;
use crate::engine::{EngineError, TaskHandle, TaskRegistry};
use crate::task::{
    BuildScriptsOptions, RenderKind, TaskError, TaskFn, TsLocations, WatchFn, build_scripts, clean, copy_group,
    render_group, task_fn, tsconfig_json,
};

/// Handles of the shared tasks, for kind-specific composition
#[derive(Debug, Clone)]
pub struct BaseHandles {
    pub scripts: TaskHandle,
    /// Always registered; a no-op without copy operations
    pub copy: TaskHandle,
    pub pug: Option<TaskHandle>,
    pub sass: Option<TaskHandle>,
    pub clean: TaskHandle,
    pub tsconfig_json: Option<TaskHandle>,
}

impl BaseHandles {
    /// Asset tasks that run alongside the script compilation
    pub fn assets(&self) -> Vec<&TaskHandle> {
        std::iter::once(&self.copy)
            .chain([&self.pug, &self.sass].into_iter().flatten())
            .collect()
    }
}

/// Register one task per group; several groups get an umbrella running them
/// in parallel
pub(super) fn register_groups(
    registry: &mut TaskRegistry,
    name: String,
    groups: Vec<(String, TaskFn)>,
) -> Result<Option<TaskHandle>, EngineError> {
    if groups.len() <= 1 {
        return match groups.into_iter().next() {
            Some((_, task)) => registry.task(name, &[], task).map(Some),
            None => Ok(None),
        };
    }

    let mut handles = Vec::with_capacity(groups.len());
    for (group, task) in groups {
        handles.push(registry.task(format!("{}:{}", name, group), &[], task)?);
    }
    let refs: Vec<&TaskHandle> = handles.iter().collect();
    registry.parallel(name, &refs).map(Some)
}

/// Like [`register_groups`], but registers a no-op under `name` when there are
/// no groups
pub(super) fn register_required_groups(
    registry: &mut TaskRegistry,
    name: String,
    groups: Vec<(String, TaskFn)>,
) -> Result<TaskHandle, EngineError> {
    match register_groups(registry, name.clone(), groups)? {
        Some(handle) => Ok(handle),
        None => registry.task(name, &[], task_fn(|| async { Ok(()) })),
    }
}

fn split<T>(
    groups: &BTreeMap<String, Vec<T>>,
    make: impl Fn(Vec<T>) -> (TaskFn, WatchFn),
    watchers: &mut Vec<WatchFn>,
) -> Vec<(String, TaskFn)>
where
    T: Clone,
{
    groups
        .iter()
        .map(|(group, ops)| {
            let (task, watcher) = make(ops.clone());
            watchers.push(watcher);
            (group.clone(), task)
        })
        .collect()
}

/// Register `:build:scripts`, `:build:copy`, `:build:pug`, `:build:sass`,
/// `:clean` and `:tsconfig.json`; returns the handles and every watcher
pub(super) fn register_base(
    registry: &mut TaskRegistry,
    target: &ResolvedTargetBase,
) -> Result<(BaseHandles, Vec<WatchFn>), EngineError> {
    debug!(name = %target.name, "register_base: called");
    let mut watchers = Vec::new();

    let (scripts_task, scripts_watch) = build_scripts(BuildScriptsOptions {
        tsc: target.tools.tsc.clone(),
        src_dir: target.src_dir.clone(),
        out_dir: target.build_dir.clone(),
        scripts: target.scripts.clone(),
        compiler_options: target.tsc_options.clone(),
        type_roots: target.type_roots.clone(),
    });
    watchers.push(scripts_watch);
    let scripts = registry.task(target.task_name("build:scripts"), &[], scripts_task)?;

    let copy_tasks = split(&target.copy, copy_group, &mut watchers);
    let copy = register_required_groups(registry, target.task_name("build:copy"), copy_tasks)?;

    let pug_tasks = split(
        &target.pug,
        |ops| render_group(RenderKind::Pug, ops, &target.tools.pug),
        &mut watchers,
    );
    let pug = register_groups(registry, target.task_name("build:pug"), pug_tasks)?;

    let sass_tasks = split(
        &target.sass,
        |ops| render_group(RenderKind::Sass, ops, &target.tools.sass),
        &mut watchers,
    );
    let sass = register_groups(registry, target.task_name("build:sass"), sass_tasks)?;

    let clean = registry.task(target.task_name("clean"), &[], clean(target.clean.clone()))?;

    let tsconfig_json = match &target.tsconfig_json {
        Some(path) => {
            let locations = TsLocations::new(
                path,
                &target.src_dir,
                &target.build_dir,
                &target.type_roots,
                &target.scripts,
            );
            let task = tsconfig_json(path.clone(), target.tsc_options.clone(), locations);
            Some(registry.task(target.task_name("tsconfig.json"), &[], task)?)
        }
        None => None,
    };

    let handles = BaseHandles {
        scripts,
        copy,
        pug,
        sass,
        clean,
        tsconfig_json,
    };
    Ok((handles, watchers))
}

/// Register `:watch`: run `build`, start every watcher, wait for Ctrl-C
pub(super) fn register_watch(
    registry: &mut TaskRegistry,
    target: &ResolvedTargetBase,
    build: &TaskHandle,
    watchers: Vec<WatchFn>,
) -> Result<TaskHandle, EngineError> {
    let name = target.task_name("watch");
    let label = name.clone();
    let task = task_fn(move || {
        let watchers = watchers.clone();
        let label = label.clone();
        async move {
            let mut handles = Vec::new();
            for watcher in &watchers {
                handles.extend(watcher()?);
            }
            info!(task = %label, watchers = handles.len(), "Watching, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.map_err(TaskError::Signal)?;
            drop(handles);
            info!(task = %label, "Stopped watching");
            Ok(())
        }
    });
    registry.task(name, &[build], task)
}

#[cfg(test)]
mod tests {
    use super::super::testing::StubFs;
    use super::super::{AssetOptions, TargetBase, resolve_target_base};
    use super::*;
    use crate::project::{Project, resolve_project};
    use std::path::PathBuf;

    fn resolved(copy: Vec<AssetOptions>) -> ResolvedTargetBase {
        let project = resolve_project(&Project::new("/proj")).unwrap();
        let target = TargetBase {
            copy,
            ..TargetBase::new("app")
        };
        resolve_target_base(&project, &target, &StubFs::default()).unwrap()
    }

    fn named(name: Option<&str>, files: &str) -> AssetOptions {
        AssetOptions {
            name: name.map(str::to_string),
            files: Some(vec![files.to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn test_same_named_copies_make_one_task() {
        let mut registry = TaskRegistry::new();
        let target = resolved(vec![named(Some("static"), "*.json"), named(Some("static"), "*.txt")]);
        let (handles, watchers) = register_base(&mut registry, &target).unwrap();

        let copy_tasks: Vec<String> = registry
            .names()
            .into_iter()
            .filter(|name| name.starts_with("app:build:copy"))
            .collect();
        assert_eq!(copy_tasks, vec!["app:build:copy"]);
        assert_eq!(handles.copy.name(), "app:build:copy");
        // scripts + one copy group
        assert_eq!(watchers.len(), 2);
    }

    #[test]
    fn test_differently_named_copies_get_umbrella() {
        let mut registry = TaskRegistry::new();
        let target = resolved(vec![named(Some("json"), "*.json"), named(None, "*.txt")]);
        register_base(&mut registry, &target).unwrap();

        assert!(registry.contains("app:build:copy:json"));
        assert!(registry.contains("app:build:copy:default"));
        assert_eq!(
            registry.execution_order("app:build:copy").unwrap(),
            vec!["app:build:copy:default", "app:build:copy:json", "app:build:copy"]
        );
    }

    #[tokio::test]
    async fn test_copy_is_registered_without_operations() {
        let mut registry = TaskRegistry::new();
        let (handles, watchers) = register_base(&mut registry, &resolved(vec![])).unwrap();

        assert_eq!(handles.copy.name(), "app:build:copy");
        assert!(registry.contains("app:build:copy"));
        // scripts only
        assert_eq!(watchers.len(), 1);
        registry.run("app:build:copy").await.unwrap();
    }

    #[test]
    fn test_tsconfig_task_follows_resolution() {
        let mut registry = TaskRegistry::new();
        let (handles, _) = register_base(&mut registry, &resolved(vec![])).unwrap();
        assert_eq!(handles.tsconfig_json.as_ref().unwrap().name(), "app:tsconfig.json");
        assert_eq!(handles.assets(), vec![&handles.copy]);

        let mut target = resolved(vec![]);
        target.tsconfig_json = None;
        let mut registry = TaskRegistry::new();
        let (handles, _) = register_base(&mut registry, &target).unwrap();
        assert!(handles.tsconfig_json.is_none());
        assert!(!registry.contains("app:tsconfig.json"));
        assert_eq!(target.clean.dirs, vec![PathBuf::from("/proj/build/app")]);
    }
}
