//! Project descriptor and its resolution

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::glob;
use crate::options::{CompilerOptions, TslintOptions};

fn default_package_json() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_src_dir() -> PathBuf {
    PathBuf::from("src")
}

/// Project-wide layout; every relative path is anchored at `root`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Project {
    pub root: PathBuf,

    #[serde(default = "default_package_json")]
    pub package_json: PathBuf,

    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,

    #[serde(default)]
    pub tslint: Option<TslintOptions>,

    /// Project-level compiler option overrides
    #[serde(default)]
    pub typescript: Option<CompilerOptions>,
}

impl Project {
    /// A project at `root` with the default layout
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(?root, "Project::new: called");
        Self {
            root,
            package_json: default_package_json(),
            build_dir: default_build_dir(),
            dist_dir: default_dist_dir(),
            src_dir: default_src_dir(),
            tslint: None,
            typescript: None,
        }
    }
}

/// A [`Project`] with every location absolute and normalized
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProject {
    pub root: PathBuf,
    pub package_json: PathBuf,
    pub build_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub src_dir: PathBuf,
    pub tslint: TslintOptions,
    pub typescript: Option<CompilerOptions>,
}

impl ResolvedProject {
    /// Absolute form of a path anchored at the project root
    pub fn absolute(&self, path: &Path) -> PathBuf {
        glob::normalize_path(&self.root.join(path))
    }
}

/// Make every project location absolute
///
/// Pure; recomputed on every call.
pub fn resolve_project(project: &Project) -> Result<ResolvedProject, ConfigError> {
    debug!(root = ?project.root, "resolve_project: called");
    if !project.root.is_absolute() {
        return Err(ConfigError::RelativeRoot(project.root.clone()));
    }
    let root = glob::normalize_path(&project.root);
    let anchor = |path: &Path| glob::normalize_path(&root.join(path));

    Ok(ResolvedProject {
        package_json: anchor(&project.package_json),
        build_dir: anchor(&project.build_dir),
        dist_dir: anchor(&project.dist_dir),
        src_dir: anchor(&project.src_dir),
        tslint: project.tslint.clone().unwrap_or_default(),
        typescript: project.typescript.clone(),
        root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let resolved = resolve_project(&Project::new("/proj")).unwrap();
        assert_eq!(resolved.root, PathBuf::from("/proj"));
        assert_eq!(resolved.package_json, PathBuf::from("/proj/package.json"));
        assert_eq!(resolved.build_dir, PathBuf::from("/proj/build"));
        assert_eq!(resolved.dist_dir, PathBuf::from("/proj/dist"));
        assert_eq!(resolved.src_dir, PathBuf::from("/proj/src"));
    }

    #[test]
    fn test_paths_are_normalized() {
        let mut project = Project::new("/proj/./tools/..");
        project.build_dir = PathBuf::from("out/../artifacts");
        let resolved = resolve_project(&project).unwrap();
        assert_eq!(resolved.root, PathBuf::from("/proj"));
        assert_eq!(resolved.build_dir, PathBuf::from("/proj/artifacts"));
    }

    #[test]
    fn test_relative_root_is_rejected() {
        let err = resolve_project(&Project::new("proj")).unwrap_err();
        assert!(matches!(err, ConfigError::RelativeRoot(_)));
    }

    #[test]
    fn test_deserialize_kebab_case() {
        let project: Project = serde_yaml::from_str("root: /proj\nbuild-dir: out\n").unwrap();
        assert_eq!(project.build_dir, PathBuf::from("out"));
        assert_eq!(project.src_dir, PathBuf::from("src"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let project = Project::new("/proj");
        assert_eq!(resolve_project(&project).unwrap(), resolve_project(&project).unwrap());
    }
}
