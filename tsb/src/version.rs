//! Version bumps and the release protocol
//!
//! `release` is strictly ordered: both pre-condition checks must pass before
//! package.json is touched, and every git mutation runs in sequence. There is
//! no rollback. A failure after the package.json write leaves the repository
//! partially released (e.g. committed but untagged) and is reported as is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::project::ResolvedProject;
use crate::task::{TaskError, read_json, write_json};
use crate::vcs::{Vcs, ensure_clean_branch, ensure_tag_absent};

/// Which semver field to increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpKind::Major => write!(f, "major"),
            BumpKind::Minor => write!(f, "minor"),
            BumpKind::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for BumpKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(BumpKind::Major),
            "minor" => Ok(BumpKind::Minor),
            "patch" => Ok(BumpKind::Patch),
            other => Err(TaskError::InvalidVersion(format!("unknown bump kind `{}`", other))),
        }
    }
}

impl BumpKind {
    pub const ALL: [BumpKind; 3] = [BumpKind::Major, BumpKind::Minor, BumpKind::Patch];
}

fn parse_core(version: &str) -> Result<(u64, u64, u64, bool), TaskError> {
    let invalid = || TaskError::InvalidVersion(version.to_string());
    let without_build = version.split('+').next().unwrap_or(version);
    let (core, prerelease) = match without_build.split_once('-') {
        Some((core, pre)) if !pre.is_empty() => (core, true),
        Some(_) => return Err(invalid()),
        None => (without_build, false),
    };

    let fields: Vec<u64> = core
        .split('.')
        .map(|field| field.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    match fields.as_slice() {
        [major, minor, patch] => Ok((*major, *minor, *patch, prerelease)),
        _ => Err(invalid()),
    }
}

/// Increment `version`
///
/// A pre-release is promoted to its release when the fields below the bumped
/// one are already zero (`1.0.0-rc.1` major is `1.0.0`, `1.2.3-beta` patch is
/// `1.2.3`). Build metadata is dropped.
pub fn bump(version: &str, kind: BumpKind) -> Result<String, TaskError> {
    debug!(%version, %kind, "bump: called");
    let (major, minor, patch, prerelease) = parse_core(version.trim())?;
    let increment = |field: u64| {
        field
            .checked_add(1)
            .ok_or_else(|| TaskError::InvalidVersion(format!("{} cannot be bumped", version)))
    };
    let next = match kind {
        BumpKind::Major if prerelease && minor == 0 && patch == 0 => (major, 0, 0),
        BumpKind::Major => (increment(major)?, 0, 0),
        BumpKind::Minor if prerelease && patch == 0 => (major, minor, 0),
        BumpKind::Minor => (major, increment(minor)?, 0),
        BumpKind::Patch if prerelease => (major, minor, patch),
        BumpKind::Patch => (major, minor, increment(patch)?),
    };
    Ok(format!("{}.{}.{}", next.0, next.1, next.2))
}

/// Next version computed from the project's package.json; nothing is written
pub async fn get_next_version(kind: BumpKind, project: &ResolvedProject) -> Result<String, TaskError> {
    debug!(%kind, package_json = ?project.package_json, "get_next_version: called");
    let manifest = read_json(&project.package_json).await?;
    let current = manifest
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| TaskError::InvalidVersion(format!("{} has no version", project.package_json.display())))?;
    bump(current, kind)
}

fn default_allowed_branches() -> Vec<String> {
    vec!["master".to_string(), "main".to_string()]
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Release settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseOptions {
    /// Branches a release may be cut from; empty allows any
    #[serde(default = "default_allowed_branches")]
    pub allowed_branches: Vec<String>,

    /// Push the release commit and tag after tagging
    #[serde(default)]
    pub push: bool,

    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            allowed_branches: default_allowed_branches(),
            push: false,
            remote: default_remote(),
        }
    }
}

/// Tag name of a version
pub fn release_tag(version: &str) -> String {
    format!("v{}", version)
}

/// Write `version` into package.json, commit and tag it
pub async fn release(
    version: &str,
    project: &ResolvedProject,
    vcs: &dyn Vcs,
    options: &ReleaseOptions,
) -> Result<(), TaskError> {
    debug!(%version, "release: called");
    let tag = release_tag(version);
    let message = format!("Release {}", tag);

    tokio::try_join!(
        ensure_tag_absent(vcs, &tag),
        ensure_clean_branch(vcs, &options.allowed_branches)
    )?;

    let path = &project.package_json;
    let mut manifest = read_json(path).await?;
    let object = manifest
        .as_object_mut()
        .ok_or_else(|| TaskError::NotAnObject { path: path.clone() })?;
    object.insert("version".to_string(), Value::String(version.to_string()));
    write_json(path, &manifest).await?;

    vcs.add_all().await?;
    vcs.commit(&message, None).await?;
    vcs.tag(&tag, &message).await?;
    if options.push {
        vcs.push(&options.remote, &["HEAD".to_string(), tag.clone()]).await?;
    }

    info!(%version, %tag, pushed = options.push, "Released");
    Ok(())
}
