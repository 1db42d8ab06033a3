//! Target descriptors, their resolution and task registration
//!
//! A target is a named build unit. Every relative path in a descriptor has a
//! fixed anchor, kept explicit here:
//!
//! | field                                    | anchor            |
//! |------------------------------------------|-------------------|
//! | `src-dir`, `build-dir`                   | project root      |
//! | `custom-typings-dir`, `tsconfig-json`    | project root      |
//! | `scripts`                                | target `src-dir`  |
//! | asset `src`                              | target `src-dir`  |
//! | asset `dest`                             | target `build-dir`|
//! | clean `dirs`, `files`                    | project root      |
//!
//! Resolution turns a descriptor into a `Resolved*` value with every path
//! absolute, every pattern anchored and every option merged.

mod common;
mod lib_target;
mod mocha;
mod node;
mod webpack;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigError, deserialize_some};
use crate::engine::{EngineError, TaskRegistry};
use crate::glob::{self, MatcherPattern};
use crate::options::{CompilerOptions, DEV, merge_tiers};
use crate::project::ResolvedProject;
use crate::task::{CleanSpec, CopyOperation, RenderKind, RenderOperation};
use crate::vcs::Vcs;

pub use common::BaseHandles;
pub use lib_target::{
    DistOptions, LibTarget, ResolvedDist, ResolvedLibTarget, ResolvedTypedoc, TypedocOptions, register_lib_target,
    resolve_lib_target,
};
pub use mocha::{MochaTarget, ResolvedMochaTarget, register_mocha_target, resolve_mocha_target};
pub use node::{NodeTarget, ResolvedNodeTarget, register_node_target, resolve_node_target};
pub use webpack::{ResolvedWebpackTarget, WebpackTarget, register_webpack_target, resolve_webpack_target};

/// Group name of assets without an explicit `name`
pub const DEFAULT_GROUP: &str = "default";

/// Filesystem queries made during resolution
pub trait FsProbe {
    fn is_dir(&self, path: &Path) -> bool;
}

/// [`FsProbe`] over the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

fn default_tool(name: &str) -> String {
    name.to_string()
}

/// Executables of the delegated tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolCommands {
    pub tsc: String,
    pub tslint: String,
    pub webpack: String,
    pub mocha: String,
    pub nyc: String,
    pub typedoc: String,
    pub npm: String,
    pub pug: String,
    pub sass: String,
    pub node: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            tsc: default_tool("tsc"),
            tslint: default_tool("tslint"),
            webpack: default_tool("webpack"),
            mocha: default_tool("mocha"),
            nyc: default_tool("nyc"),
            typedoc: default_tool("typedoc"),
            npm: default_tool("npm"),
            pug: default_tool("pug"),
            sass: default_tool("sass"),
            node: default_tool("node"),
        }
    }
}

/// A copy, pug or sass operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AssetOptions {
    /// Operations sharing a name run as one task
    pub name: Option<String>,
    pub src: Option<PathBuf>,
    pub files: Option<Vec<String>>,
    pub dest: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CleanOptions {
    /// Plain directories; the target build dir when absent
    pub dirs: Option<Vec<PathBuf>>,
    pub files: Vec<String>,
}

/// Fields shared by every target kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetBase {
    pub name: String,

    #[serde(default)]
    pub src_dir: Option<PathBuf>,

    #[serde(default)]
    pub build_dir: Option<PathBuf>,

    #[serde(default)]
    pub scripts: Option<Vec<String>>,

    /// Absent: probe `<src-dir>/custom-typings`; `null`: disabled
    #[serde(default, deserialize_with = "deserialize_some")]
    pub custom_typings_dir: Option<Option<PathBuf>>,

    #[serde(default)]
    pub tsc_options: Option<CompilerOptions>,

    /// Absent: `<src-dir>/tsconfig.json`; `null`: not generated
    #[serde(default, deserialize_with = "deserialize_some")]
    pub tsconfig_json: Option<Option<PathBuf>>,

    #[serde(default)]
    pub copy: Vec<AssetOptions>,

    #[serde(default)]
    pub pug: Vec<AssetOptions>,

    #[serde(default)]
    pub sass: Vec<AssetOptions>,

    #[serde(default)]
    pub clean: Option<CleanOptions>,

    #[serde(default)]
    pub tools: ToolCommands,
}

impl TargetBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// [`TargetBase`] with every location absolute and every option merged
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTargetBase {
    pub name: String,
    pub project: ResolvedProject,
    pub src_dir: PathBuf,
    pub build_dir: PathBuf,
    pub scripts: Vec<MatcherPattern>,
    pub custom_typings_dir: Option<PathBuf>,
    pub type_roots: Vec<PathBuf>,
    pub tsc_options: CompilerOptions,
    pub tsconfig_json: Option<PathBuf>,
    /// Keyed by group name
    pub copy: BTreeMap<String, Vec<CopyOperation>>,
    pub pug: BTreeMap<String, Vec<RenderOperation>>,
    pub sass: BTreeMap<String, Vec<RenderOperation>>,
    pub clean: CleanSpec,
    pub tools: ToolCommands,
}

impl ResolvedTargetBase {
    /// Prefix a task suffix with the target name
    pub fn task_name(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, suffix)
        }
    }
}

/// Reject names that would break task names or output paths
pub fn validate_target_name(name: &str) -> Result<(), ConfigError> {
    let invalid = name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', ':']);
    if invalid {
        return Err(ConfigError::InvalidTargetName(name.to_string()));
    }
    Ok(())
}

fn group_assets<T>(
    assets: &[AssetOptions],
    default_files: &[&str],
    src_dir: &Path,
    build_dir: &Path,
    make: impl Fn(PathBuf, PathBuf, Vec<MatcherPattern>) -> T,
) -> BTreeMap<String, Vec<T>> {
    let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for asset in assets {
        let from = asset
            .src
            .as_ref()
            .map(|src| glob::normalize_path(&src_dir.join(src)))
            .unwrap_or_else(|| src_dir.to_path_buf());
        let to = asset
            .dest
            .as_ref()
            .map(|dest| glob::normalize_path(&build_dir.join(dest)))
            .unwrap_or_else(|| build_dir.to_path_buf());
        let files = match &asset.files {
            Some(files) => glob::join_all(&from, files),
            None => glob::join_all(&from, default_files),
        };
        let group = asset.name.clone().unwrap_or_else(|| DEFAULT_GROUP.to_string());
        groups.entry(group).or_default().push(make(from, to, files));
    }
    groups
}

/// Resolve the fields shared by every target kind
pub fn resolve_target_base(
    project: &ResolvedProject,
    target: &TargetBase,
    fs: &dyn FsProbe,
) -> Result<ResolvedTargetBase, ConfigError> {
    debug!(name = %target.name, "resolve_target_base: called");
    validate_target_name(&target.name)?;

    let src_dir = target
        .src_dir
        .as_ref()
        .map(|dir| project.absolute(dir))
        .unwrap_or_else(|| project.src_dir.clone());
    let build_dir = target
        .build_dir
        .as_ref()
        .map(|dir| project.absolute(dir))
        .unwrap_or_else(|| project.build_dir.join(&target.name));

    let scripts = match &target.scripts {
        Some(scripts) => glob::join_all(&src_dir, scripts),
        None => glob::join_all(&src_dir, &["**/*.ts"]),
    };

    let custom_typings_dir = match &target.custom_typings_dir {
        Some(explicit) => explicit.as_ref().map(|dir| project.absolute(dir)),
        None => {
            let probed = src_dir.join("custom-typings");
            let present = fs.is_dir(&probed);
            debug!(?probed, present, "resolve_target_base: probed custom typings");
            present.then_some(probed)
        }
    };

    let mut type_roots = vec![project.root.join("node_modules").join("@types")];
    type_roots.extend(custom_typings_dir.clone());

    let tsc_options = merge_tiers(&*DEV, [project.typescript.as_ref(), target.tsc_options.as_ref()]);

    let tsconfig_json = match &target.tsconfig_json {
        Some(explicit) => explicit.as_ref().map(|path| project.absolute(path)),
        None => Some(src_dir.join("tsconfig.json")),
    };

    let copy = group_assets(&target.copy, &["**/*"], &src_dir, &build_dir, |from, to, files| {
        CopyOperation { from, to, files }
    });
    let render = |from, to, files| RenderOperation { from, to, files };
    let pug = group_assets(&target.pug, RenderKind::Pug.default_files(), &src_dir, &build_dir, render);
    let sass = group_assets(&target.sass, RenderKind::Sass.default_files(), &src_dir, &build_dir, render);

    let clean_options = target.clean.clone().unwrap_or_default();
    let clean = CleanSpec {
        base: project.root.clone(),
        dirs: clean_options.dirs.unwrap_or_else(|| vec![build_dir.clone()]),
        files: clean_options.files.iter().map(|file| MatcherPattern::parse(file)).collect(),
    };

    Ok(ResolvedTargetBase {
        name: target.name.clone(),
        project: project.clone(),
        src_dir,
        build_dir,
        scripts,
        custom_typings_dir,
        type_roots,
        tsc_options,
        tsconfig_json,
        copy,
        pug,
        sass,
        clean,
        tools: target.tools.clone(),
    })
}

/// A target descriptor of any kind
#[derive(Debug, Clone)]
pub enum TargetConfig {
    Lib(LibTarget),
    Node(NodeTarget),
    Mocha(MochaTarget),
    Webpack(WebpackTarget),
}

impl TargetConfig {
    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn base(&self) -> &TargetBase {
        match self {
            TargetConfig::Lib(target) => &target.base,
            TargetConfig::Node(target) => &target.base,
            TargetConfig::Mocha(target) => &target.base,
            TargetConfig::Webpack(target) => &target.base,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TargetConfig::Lib(_) => "lib",
            TargetConfig::Node(_) => "node",
            TargetConfig::Mocha(_) => "mocha",
            TargetConfig::Webpack(_) => "webpack",
        }
    }
}

/// Resolve a target of any kind and register its tasks
pub fn register_target(
    registry: &mut TaskRegistry,
    project: &ResolvedProject,
    target: &TargetConfig,
    fs: &dyn FsProbe,
    vcs: Arc<dyn Vcs>,
) -> Result<(), EngineError> {
    debug!(name = %target.name(), kind = target.kind(), "register_target: called");
    match target {
        TargetConfig::Lib(lib) => {
            let resolved = resolve_lib_target(project, lib, fs)?;
            register_lib_target(registry, &resolved, vcs)
        }
        TargetConfig::Node(node) => {
            let resolved = resolve_node_target(project, node, fs)?;
            register_node_target(registry, &resolved)
        }
        TargetConfig::Mocha(mocha) => {
            let resolved = resolve_mocha_target(project, mocha, fs)?;
            register_mocha_target(registry, &resolved)
        }
        TargetConfig::Webpack(webpack) => {
            let resolved = resolve_webpack_target(project, webpack, fs)?;
            register_webpack_target(registry, &resolved)
        }
    }
}
