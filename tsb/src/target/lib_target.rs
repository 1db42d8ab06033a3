//! Library targets: the shared build plus a self-contained `dist` tree and
//! generated documentation

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::common::{register_base, register_required_groups, register_watch};
use super::{FsProbe, ResolvedTargetBase, TargetBase, resolve_target_base};
use crate::config::{ConfigError, Toggle};
use crate::engine::{EngineError, TaskHandle, TaskRegistry};
use crate::glob::{self, MatcherPattern};
use crate::options::{CompilerOptions, PROD, merge_tiers};
use crate::project::ResolvedProject;
use crate::task::{
    BranchPublishOptions, BuildScriptsOptions, CleanSpec, CopyOperation, DistPackageJsonOptions, NpmPublishOptions,
    PackageJsonMap, TypedocTaskOptions, build_scripts, clean, copy, copy_group, dist_package_json, npm_publish,
    publish_to_branch, task_fn, typedoc,
};
use crate::vcs::Vcs;

/// Subdirectory of the dist dir holding the shipped sources
const DIST_SRC: &str = "_src";
const DIST_TYPINGS: &str = "_custom-typings";

fn publish_by_default() -> Toggle<NpmPublishOptions> {
    Toggle::Flag(true)
}

/// The `dist` block of a lib target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DistOptions {
    /// Relative to the project root; `<dist-dir>/<name>` by default
    #[serde(default)]
    pub dist_dir: Option<PathBuf>,

    /// Applied over the production preset
    #[serde(default)]
    pub tsc_options: Option<CompilerOptions>,

    #[serde(default = "publish_by_default")]
    pub npm_publish: Toggle<NpmPublishOptions>,

    /// Library API only
    #[serde(skip)]
    pub package_json_map: PackageJsonMap,
}

impl Default for DistOptions {
    fn default() -> Self {
        Self {
            dist_dir: None,
            tsc_options: None,
            npm_publish: publish_by_default(),
            package_json_map: PackageJsonMap::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TypedocOptions {
    /// Title of the docs; the target name by default
    pub name: Option<String>,
    /// Relative to the project root; `<build-dir>/<name>.typedoc` by default
    pub out_dir: Option<PathBuf>,
    /// Publish the generated docs to a branch
    pub deploy: Option<BranchPublishOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LibTarget {
    #[serde(flatten)]
    pub base: TargetBase,

    /// Entry module relative to the build dir, without extension
    #[serde(default)]
    pub main_module: Option<String>,

    #[serde(default)]
    pub dist: Toggle<DistOptions>,

    #[serde(default)]
    pub typedoc: Option<TypedocOptions>,
}

#[derive(Debug, Clone)]
pub struct ResolvedDist {
    pub dist_dir: PathBuf,
    /// `<dist-dir>/_src`
    pub src_dir: PathBuf,
    /// `<dist-dir>/_custom-typings`, when the target has custom typings
    pub typings_dir: Option<PathBuf>,
    /// Script patterns rebased onto `src_dir`
    pub scripts: Vec<MatcherPattern>,
    pub type_roots: Vec<PathBuf>,
    pub tsc_options: CompilerOptions,
    pub package_json_map: PackageJsonMap,
    pub npm_publish: Option<NpmPublishOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTypedoc {
    pub name: String,
    pub out_dir: PathBuf,
    pub tsconfig: PathBuf,
    pub deploy: Option<BranchPublishOptions>,
}

#[derive(Debug, Clone)]
pub struct ResolvedLibTarget {
    pub base: ResolvedTargetBase,
    pub main_module: Option<String>,
    pub dist: Option<ResolvedDist>,
    pub typedoc: Option<ResolvedTypedoc>,
}

fn resolve_dist(
    project: &ResolvedProject,
    target: &LibTarget,
    base: &ResolvedTargetBase,
    options: &DistOptions,
) -> ResolvedDist {
    let dist_dir = options
        .dist_dir
        .as_ref()
        .map(|dir| project.absolute(dir))
        .unwrap_or_else(|| project.dist_dir.join(&base.name));
    let src_dir = dist_dir.join(DIST_SRC);
    let typings_dir = base.custom_typings_dir.as_ref().map(|_| dist_dir.join(DIST_TYPINGS));

    let scripts = base
        .scripts
        .iter()
        .map(|pattern| glob::join(&src_dir, &glob::relative(&base.src_dir, pattern)))
        .collect();

    let mut type_roots = vec![project.root.join("node_modules").join("@types")];
    type_roots.extend(typings_dir.clone());

    let tsc_options = merge_tiers(
        &*PROD,
        [
            project.typescript.as_ref(),
            target.base.tsc_options.as_ref(),
            options.tsc_options.as_ref(),
        ],
    );

    ResolvedDist {
        dist_dir,
        src_dir,
        typings_dir,
        scripts,
        type_roots,
        tsc_options,
        package_json_map: options.package_json_map.clone(),
        npm_publish: options.npm_publish.resolve(),
    }
}

pub fn resolve_lib_target(
    project: &ResolvedProject,
    target: &LibTarget,
    fs: &dyn FsProbe,
) -> Result<ResolvedLibTarget, ConfigError> {
    debug!(name = %target.base.name, "resolve_lib_target: called");
    let mut base = resolve_target_base(project, &target.base, fs)?;

    let dist = match target.dist.resolve() {
        Some(options) => {
            if target.main_module.is_none() {
                return Err(ConfigError::MissingField {
                    target: base.name.clone(),
                    field: "main-module",
                });
            }
            let dist = resolve_dist(project, target, &base, &options);
            let explicit_clean_dirs = target.base.clean.as_ref().is_some_and(|clean| clean.dirs.is_some());
            if !explicit_clean_dirs {
                base.clean.dirs.push(dist.dist_dir.clone());
            }
            Some(dist)
        }
        None => None,
    };

    let typedoc = match &target.typedoc {
        Some(options) => {
            let tsconfig = base.tsconfig_json.clone().ok_or_else(|| ConfigError::MissingField {
                target: base.name.clone(),
                field: "tsconfig-json",
            })?;
            Some(ResolvedTypedoc {
                name: options.name.clone().unwrap_or_else(|| base.name.clone()),
                out_dir: options
                    .out_dir
                    .as_ref()
                    .map(|dir| project.absolute(dir))
                    .unwrap_or_else(|| project.build_dir.join(format!("{}.typedoc", base.name))),
                tsconfig,
                deploy: options.deploy.clone(),
            })
        }
        None => None,
    };

    Ok(ResolvedLibTarget {
        main_module: target.main_module.clone(),
        base,
        dist,
        typedoc,
    })
}

fn register_dist(
    registry: &mut TaskRegistry,
    target: &ResolvedLibTarget,
    dist: &ResolvedDist,
    main_module: &str,
    vcs: Arc<dyn Vcs>,
) -> Result<TaskHandle, EngineError> {
    let base = &target.base;

    // `_src` holds exactly the current sources
    let clear_src = clean(CleanSpec {
        base: dist.dist_dir.clone(),
        dirs: vec![PathBuf::from(DIST_SRC)],
        files: Vec::new(),
    });
    let (copy_src_task, _) = copy(CopyOperation {
        from: base.src_dir.clone(),
        to: dist.src_dir.clone(),
        files: base.scripts.clone(),
    });
    let copy_src_task = task_fn(move || {
        let clear_src = clear_src.clone();
        let copy_src_task = copy_src_task.clone();
        async move {
            clear_src().await?;
            copy_src_task().await
        }
    });
    let copy_src = registry.task(base.task_name("dist:copy-src"), &[], copy_src_task)?;

    let mut script_predecessors = vec![copy_src];
    if let (Some(from), Some(to)) = (&base.custom_typings_dir, &dist.typings_dir) {
        let (task, _) = copy(CopyOperation {
            from: from.clone(),
            to: to.clone(),
            files: glob::join_all(from, &["**/*.d.ts"]),
        });
        script_predecessors.push(registry.task(base.task_name("dist:copy-custom-typings"), &[], task)?);
    }

    let copy_groups = base
        .copy
        .iter()
        .map(|(group, ops)| {
            let rebased = ops
                .iter()
                .map(|op| CopyOperation {
                    to: dist.dist_dir.join(glob::relative_path(&base.build_dir, &op.to)),
                    ..op.clone()
                })
                .collect();
            (group.clone(), copy_group(rebased).0)
        })
        .collect();
    let dist_copy = register_required_groups(registry, base.task_name("dist:copy"), copy_groups)?;

    let (scripts_task, _) = build_scripts(BuildScriptsOptions {
        tsc: base.tools.tsc.clone(),
        src_dir: dist.src_dir.clone(),
        out_dir: dist.dist_dir.clone(),
        scripts: dist.scripts.clone(),
        compiler_options: dist.tsc_options.clone(),
        type_roots: dist.type_roots.clone(),
    });
    let predecessors: Vec<&TaskHandle> = script_predecessors.iter().collect();
    let scripts = registry.task(base.task_name("dist:scripts"), &predecessors, scripts_task)?;

    let package_json_task = dist_package_json(
        DistPackageJsonOptions {
            package_json: base.project.package_json.clone(),
            dist_dir: dist.dist_dir.clone(),
            main_module: main_module.to_string(),
            map: dist.package_json_map.clone(),
        },
        vcs,
    );
    let package_json = registry.task(base.task_name("dist:package.json"), &[], package_json_task)?;

    let dist_handle = registry.parallel(base.task_name("dist"), &[&dist_copy, &scripts, &package_json])?;

    if let Some(publish) = &dist.npm_publish {
        let task = npm_publish(dist.dist_dir.clone(), publish.clone());
        registry.task(base.task_name("dist:publish"), &[&dist_handle], task)?;
    }
    Ok(dist_handle)
}

fn register_typedoc(
    registry: &mut TaskRegistry,
    base: &ResolvedTargetBase,
    docs: &ResolvedTypedoc,
    tsconfig: Option<&TaskHandle>,
) -> Result<(), EngineError> {
    let task = typedoc(TypedocTaskOptions {
        typedoc: base.tools.typedoc.clone(),
        out_dir: docs.out_dir.clone(),
        tsconfig: docs.tsconfig.clone(),
        name: docs.name.clone(),
        src_dir: base.src_dir.clone(),
    });
    let predecessors: Vec<&TaskHandle> = tsconfig.into_iter().collect();
    let generated = registry.task(base.task_name("typedoc"), &predecessors, task)?;

    if let Some(deploy) = &docs.deploy {
        let task = publish_to_branch(docs.out_dir.clone(), deploy.clone());
        registry.task(base.task_name("typedoc:deploy"), &[&generated], task)?;
    }
    Ok(())
}

/// Register the shared tasks, the `dist` tree and the documentation tasks
pub fn register_lib_target(
    registry: &mut TaskRegistry,
    target: &ResolvedLibTarget,
    vcs: Arc<dyn Vcs>,
) -> Result<(), EngineError> {
    debug!(name = %target.base.name, "register_lib_target: called");
    let base = &target.base;
    let (handles, watchers) = register_base(registry, base)?;

    let mut parts = vec![&handles.scripts];
    parts.extend(handles.assets());
    let build = registry.parallel(base.task_name("build"), &parts)?;
    register_watch(registry, base, &build, watchers)?;

    if let (Some(dist), Some(main_module)) = (&target.dist, &target.main_module) {
        register_dist(registry, target, dist, main_module, vcs)?;
    }
    if let Some(docs) = &target.typedoc {
        register_typedoc(registry, base, docs, handles.tsconfig_json.as_ref())?;
    }
    Ok(())
}
