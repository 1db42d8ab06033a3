//! Build descriptor file loading
//!
//! The command-line tool reads `tsbuild.yml`: a `project` block, optional
//! project-level `tools` and `release` blocks, and a `targets` list tagged by
//! `kind`. Library consumers can skip this module and construct the
//! descriptors in code.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::project::Project;
use crate::target::{LibTarget, MochaTarget, NodeTarget, TargetConfig, ToolCommands, WebpackTarget, validate_target_name};
use crate::version::ReleaseOptions;

/// Default descriptor file name
pub const CONFIG_FILE: &str = "tsbuild.yml";

/// Errors raised while reading or validating descriptors
///
/// All of these surface before any task runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Target {target}: unknown kind `{kind}` (expected lib, node, mocha or webpack)")]
    UnknownTargetKind { target: String, kind: String },

    #[error("Target {target}: missing required field `{field}`")]
    MissingField { target: String, field: &'static str },

    #[error("Invalid target name `{0}`: must be non-empty and free of `/`, `\\` and `:`")]
    InvalidTargetName(String),

    #[error("Target {0} is defined more than once")]
    DuplicateTarget(String),

    #[error("Project root must be absolute: {0}")]
    RelativeRoot(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Target {target}: {source}")]
    Target {
        target: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Keep an explicit `null` distinct from an absent key
///
/// Use with `#[serde(default, deserialize_with = "deserialize_some")]` on an
/// `Option<Option<T>>`: absent is `None`, `null` is `Some(None)`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// `false`, `true`, or a block of options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Flag(bool),
    Options(T),
}

impl<T> Default for Toggle<T> {
    fn default() -> Self {
        Toggle::Flag(false)
    }
}

impl<T: Default + Clone> Toggle<T> {
    /// `None` when disabled; `true` expands to the default options
    pub fn resolve(&self) -> Option<T> {
        match self {
            Toggle::Flag(false) => None,
            Toggle::Flag(true) => Some(T::default()),
            Toggle::Options(options) => Some(options.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    project: Project,

    #[serde(default)]
    tools: ToolCommands,

    #[serde(default)]
    release: ReleaseOptions,

    #[serde(default)]
    targets: Vec<Value>,
}

/// A parsed and validated descriptor file
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub project: Project,
    /// Tools used by project-level tasks
    pub tools: ToolCommands,
    pub release: ReleaseOptions,
    pub targets: Vec<TargetConfig>,
}

impl BuildConfig {
    /// Read a descriptor file; a relative project root is anchored at the
    /// file's directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(?path, "BuildConfig::load: called");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        if config.project.root.is_relative() {
            let absolute = std::path::absolute(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let base = absolute.parent().map(Path::to_path_buf).unwrap_or_default();
            config.project.root = crate::glob::normalize_path(&base.join(&config.project.root));
        }

        info!(path = %path.display(), targets = config.targets.len(), "Loaded build config");
        Ok(config)
    }

    /// Parse descriptor text; relative roots are left as written
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        debug!(len = content.len(), "BuildConfig::parse: called");
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(CONFIG_FILE),
            source,
        })?;

        let mut targets = Vec::with_capacity(raw.targets.len());
        for value in raw.targets {
            let target = parse_target(value)?;
            let name = target.name().to_string();
            if targets.iter().any(|t: &TargetConfig| t.name() == name) {
                return Err(ConfigError::DuplicateTarget(name));
            }
            targets.push(target);
        }

        Ok(Self {
            project: raw.project,
            tools: raw.tools,
            release: raw.release,
            targets,
        })
    }
}

fn parse_target(value: Value) -> Result<TargetConfig, ConfigError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingField {
            target: "<unnamed>".to_string(),
            field: "name",
        })?;
    validate_target_name(&name)?;
    debug!(%name, "parse_target: called");

    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingField {
            target: name.clone(),
            field: "kind",
        })?;

    let wrap = |source| ConfigError::Target {
        target: name.clone(),
        source,
    };
    let target = match kind.as_str() {
        "lib" => TargetConfig::Lib(serde_yaml::from_value::<LibTarget>(value).map_err(wrap)?),
        "node" => TargetConfig::Node(serde_yaml::from_value::<NodeTarget>(value).map_err(wrap)?),
        "mocha" => TargetConfig::Mocha(serde_yaml::from_value::<MochaTarget>(value).map_err(wrap)?),
        "webpack" => TargetConfig::Webpack(serde_yaml::from_value::<WebpackTarget>(value).map_err(wrap)?),
        _ => return Err(ConfigError::UnknownTargetKind { target: name, kind }),
    };
    Ok(target)
}
