//! File watching for `watch` tasks
//!
//! A watcher observes a base directory recursively and re-runs a task when a
//! changed path matches the watched pattern set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::glob::{MatcherPattern, PatternSet};
use crate::task::{TaskError, TaskFn, WatchFn};

const DEBOUNCE: Duration = Duration::from_millis(200);

/// A running watcher; dropping it stops watching
pub struct WatchHandle {
    base: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
    worker: JoinHandle<()>,
}

impl WatchHandle {
    pub fn base(&self) -> &PathBuf {
        &self.base
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("base", &self.base).finish()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        debug!(base = ?self.base, "WatchHandle::drop: called");
        self.worker.abort();
    }
}

/// Build a watch function re-running `task` when a file under `base`
/// matching `patterns` changes
pub fn watch_task(base: PathBuf, patterns: Vec<MatcherPattern>, task: TaskFn) -> WatchFn {
    Arc::new(move || start(base.clone(), &patterns, task.clone()))
}

fn start(base: PathBuf, patterns: &[MatcherPattern], task: TaskFn) -> Result<Vec<WatchHandle>, TaskError> {
    debug!(?base, "watch::start: called");
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| TaskError::NoRuntime)?;
    let set = PatternSet::compile(patterns)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })?;
    debouncer.watcher().watch(&base, RecursiveMode::Recursive)?;

    let label = base.clone();
    let worker = runtime.spawn(async move {
        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) => {
                    let changed: Vec<_> = events.iter().filter(|event| set.matches(&event.path)).collect();
                    if changed.is_empty() {
                        continue;
                    }
                    info!(count = changed.len(), base = ?label, "Change detected, re-running task");
                    if let Err(e) = task().await {
                        warn!(error = %e, base = ?label, "Task failed during watch");
                    }
                }
                Err(e) => warn!(error = ?e, base = ?label, "Watcher error"),
            }
        }
    });

    info!(?base, "Watching for changes");
    Ok(vec![WatchHandle {
        base,
        _debouncer: debouncer,
        worker,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glob;
    use crate::task::task_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn test_watch_requires_runtime() {
        let temp = tempdir().unwrap();
        let task = task_fn(|| async { Ok(()) });
        let watch = watch_task(temp.path().to_path_buf(), glob::join_all(temp.path(), &["**/*"]), task);

        assert!(matches!(watch(), Err(TaskError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_watch_reruns_task_on_matching_change() {
        let temp = tempdir().unwrap();
        let base = temp.path().to_path_buf();
        let runs = Arc::new(AtomicUsize::new(0));
        let task = {
            let runs = runs.clone();
            task_fn(move || {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        let watch = watch_task(base.clone(), glob::join_all(&base, &["**/*.txt"]), task);
        let handles = watch().unwrap();
        assert_eq!(handles.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(base.join("changed.txt"), "x").unwrap();

        let mut waited = 0;
        while runs.load(Ordering::SeqCst) == 0 && waited < 50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            waited += 1;
        }
        assert!(runs.load(Ordering::SeqCst) >= 1);
    }
}
