//! clean - delete build outputs

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::{TaskError, TaskFn, task_fn};
use crate::glob::{self, MatcherPattern};

/// What to delete, relative to `base`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanSpec {
    pub base: PathBuf,
    /// Plain relative directory paths, not globs
    pub dirs: Vec<PathBuf>,
    /// Glob patterns rebased onto `base`
    pub files: Vec<MatcherPattern>,
}

impl CleanSpec {
    pub fn absolute_dirs(&self) -> Vec<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| glob::normalize_path(&self.base.join(dir)))
            .collect()
    }

    pub fn absolute_files(&self) -> Vec<MatcherPattern> {
        self.files.iter().map(|pattern| glob::join(&self.base, pattern)).collect()
    }
}

async fn remove_path(path: &Path) -> Result<bool, TaskError> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(TaskError::io(path, e)),
    };
    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(TaskError::io(path, e)),
    }
}

/// Task deleting the union of `dirs` and the files matched by `files`
///
/// Missing paths are not an error.
pub fn clean(spec: CleanSpec) -> TaskFn {
    debug!(?spec, "clean: called");
    let spec = Arc::new(spec);
    task_fn(move || {
        let spec = spec.clone();
        async move {
            let mut targets = spec.absolute_dirs();
            let patterns = spec.absolute_files();
            if !patterns.is_empty() {
                targets.extend(glob::expand(&patterns)?);
            }

            let mut removed = 0usize;
            for target in &targets {
                if remove_path(target).await? {
                    debug!(?target, "clean: removed");
                    removed += 1;
                }
            }
            info!(removed, base = ?spec.base, "Clean complete");
            Ok(())
        }
    })
}
