//! copy - mirror matched files from one directory into another

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::{TaskError, TaskFn, WatchFn, join_tasks, join_watchers, task_fn};
use crate::glob::{self, MatcherPattern};
use crate::watch;

/// One resolved copy: `files` are anchored at `from`
#[derive(Debug, Clone, PartialEq)]
pub struct CopyOperation {
    pub from: PathBuf,
    pub to: PathBuf,
    pub files: Vec<MatcherPattern>,
}

async fn run_copy(op: &CopyOperation) -> Result<usize, TaskError> {
    let files = glob::expand(&op.files)?;
    for file in &files {
        let relative = glob::relative_path(&op.from, file);
        let dest = glob::normalize_path(&op.to.join(&relative));
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(parent, e))?;
        }
        tokio::fs::copy(file, &dest).await.map_err(|e| TaskError::io(file, e))?;
        debug!(?file, ?dest, "copy: copied");
    }
    Ok(files.len())
}

/// Copy task plus a watcher re-running it when a matched file changes
pub fn copy(op: CopyOperation) -> (TaskFn, WatchFn) {
    debug!(from = ?op.from, to = ?op.to, "copy: called");
    let op = Arc::new(op);
    let task = {
        let op = op.clone();
        task_fn(move || {
            let op = op.clone();
            async move {
                let count = run_copy(&op).await?;
                info!(count, from = ?op.from, to = ?op.to, "Copied files");
                Ok(())
            }
        })
    };
    let watcher = watch::watch_task(op.from.clone(), op.files.clone(), task.clone());
    (task, watcher)
}

/// Several copies sharing one name: a single task awaiting all of them in
/// parallel, and a single watch function starting one watcher per copy
pub fn copy_group(ops: Vec<CopyOperation>) -> (TaskFn, WatchFn) {
    debug!(count = ops.len(), "copy_group: called");
    let (tasks, watchers): (Vec<TaskFn>, Vec<WatchFn>) = ops.into_iter().map(copy).unzip();
    (join_tasks(tasks), join_watchers(watchers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn op(from: &Path, to: &Path, files: &[&str]) -> CopyOperation {
        CopyOperation {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            files: glob::join_all(from, files),
        }
    }

    #[tokio::test]
    async fn test_copy_preserves_relative_layout() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        let out = temp.path().join("build");
        fs::create_dir_all(src.join("assets/img")).unwrap();
        fs::write(src.join("assets/img/logo.png"), "png").unwrap();
        fs::write(src.join("index.ts"), "ts").unwrap();

        let (task, _watch) = copy(op(&src, &out, &["**/*.png"]));
        task().await.unwrap();

        assert_eq!(fs::read_to_string(out.join("assets/img/logo.png")).unwrap(), "png");
        assert!(!out.join("index.ts").exists());
    }

    #[tokio::test]
    async fn test_copy_group_runs_every_operation() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        let out = temp.path().join("build");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.json"), "{}").unwrap();
        fs::write(src.join("b.txt"), "b").unwrap();

        let (task, _watch) = copy_group(vec![op(&src, &out, &["*.json"]), op(&src, &out.join("text"), &["*.txt"])]);
        task().await.unwrap();

        assert!(out.join("a.json").exists());
        assert!(out.join("text/b.txt").exists());
    }
}
