//! package.json reading, writing and the dist manifest

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::{TaskError, TaskFn, task_fn};
use crate::vcs::Vcs;

/// Read a JSON document; key order is preserved
pub async fn read_json(path: &Path) -> Result<Value, TaskError> {
    debug!(?path, "read_json: called");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TaskError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| TaskError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a JSON document with 2-space indentation and a trailing newline
pub async fn write_json(path: &Path, value: &Value) -> Result<(), TaskError> {
    debug!(?path, "write_json: called");
    let mut content = serde_json::to_string_pretty(value).map_err(|source| TaskError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    content.push('\n');
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TaskError::io(parent, e))?;
    }
    tokio::fs::write(path, content).await.map_err(|e| TaskError::io(path, e))
}

/// User transform applied to the dist manifest after stamping
#[derive(Clone)]
pub struct PackageJsonMap(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl PackageJsonMap {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

impl Default for PackageJsonMap {
    fn default() -> Self {
        Self::new(|value| value)
    }
}

impl fmt::Debug for PackageJsonMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PackageJsonMap(..)")
    }
}

/// Inputs of the dist manifest
#[derive(Debug, Clone)]
pub struct DistPackageJsonOptions {
    /// Source manifest
    pub package_json: PathBuf,
    pub dist_dir: PathBuf,
    /// Module path relative to the dist dir, without extension
    pub main_module: String,
    pub map: PackageJsonMap,
}

/// Stamp `main`, `types` and `gitHead` onto `manifest`, then apply the map
pub fn stamp_manifest(mut manifest: Value, main_module: &str, git_head: &str, map: &PackageJsonMap) -> Option<Value> {
    let object = manifest.as_object_mut()?;
    object.insert("main".to_string(), Value::String(format!("{}.js", main_module)));
    object.insert("types".to_string(), Value::String(format!("{}.d.ts", main_module)));
    object.insert("gitHead".to_string(), Value::String(git_head.to_string()));
    Some(map.apply(manifest))
}

/// Task writing `<dist_dir>/package.json`
pub fn dist_package_json(options: DistPackageJsonOptions, vcs: Arc<dyn Vcs>) -> TaskFn {
    debug!(package_json = ?options.package_json, dist_dir = ?options.dist_dir, "dist_package_json: called");
    let options = Arc::new(options);
    task_fn(move || {
        let options = options.clone();
        let vcs = vcs.clone();
        async move {
            let manifest = read_json(&options.package_json).await?;
            let git_head = vcs.head_hash().await?;
            let stamped = stamp_manifest(manifest, &options.main_module, &git_head, &options.map).ok_or_else(|| {
                TaskError::NotAnObject {
                    path: options.package_json.clone(),
                }
            })?;

            let dest = options.dist_dir.join("package.json");
            write_json(&dest, &stamped).await?;
            info!(?dest, %git_head, "Wrote dist package.json");
            Ok(())
        }
    })
}
