//! pug / sass - render templates and stylesheets with the delegated renderers

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::{Invocation, TaskError, TaskFn, WatchFn, join_tasks, join_watchers, run_tool, task_fn};
use crate::glob::{self, MatcherPattern};
use crate::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    Pug,
    Sass,
}

impl RenderKind {
    /// Patterns used when an operation names no files
    pub fn default_files(&self) -> &'static [&'static str] {
        match self {
            RenderKind::Pug => &["**/*.pug"],
            RenderKind::Sass => &["**/*.scss"],
        }
    }

    fn invocation(&self, command: &str, file: &Path, dest: &Path) -> Option<Invocation> {
        match self {
            RenderKind::Pug => {
                let out_dir = dest.parent().unwrap_or(dest);
                Some(Invocation::new(command).path_arg(file).arg("--out").path_arg(out_dir))
            }
            RenderKind::Sass => {
                let partial = file
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with('_'));
                if partial {
                    return None;
                }
                Some(Invocation::new(command).path_arg(file).path_arg(&dest.with_extension("css")))
            }
        }
    }
}

impl fmt::Display for RenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderKind::Pug => write!(f, "pug"),
            RenderKind::Sass => write!(f, "sass"),
        }
    }
}

/// One resolved render: `files` anchored at `from`, output mirrored under `to`
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOperation {
    pub from: PathBuf,
    pub to: PathBuf,
    pub files: Vec<MatcherPattern>,
}

async fn run_render(kind: RenderKind, command: &str, op: &RenderOperation) -> Result<usize, TaskError> {
    let mut rendered = 0;
    for file in glob::expand(&op.files)? {
        let dest = glob::normalize_path(&op.to.join(glob::relative_path(&op.from, &file)));
        let Some(invocation) = kind.invocation(command, &file, &dest) else {
            debug!(?file, "run_render: skipping partial");
            continue;
        };
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(parent, e))?;
        }
        run_tool(&invocation.cwd(&op.from), TaskError::Tool).await?;
        rendered += 1;
    }
    Ok(rendered)
}

fn render(kind: RenderKind, command: Arc<str>, op: RenderOperation) -> (TaskFn, WatchFn) {
    let op = Arc::new(op);
    let task = {
        let op = op.clone();
        task_fn(move || {
            let op = op.clone();
            let command = command.clone();
            async move {
                let count = run_render(kind, &command, &op).await?;
                info!(%kind, count, to = ?op.to, "Rendered files");
                Ok(())
            }
        })
    };
    let watcher = watch::watch_task(op.from.clone(), op.files.clone(), task.clone());
    (task, watcher)
}

/// Operations sharing a name: one task running all of them in parallel, one
/// watch function starting a watcher per operation
pub fn render_group(kind: RenderKind, ops: Vec<RenderOperation>, command: &str) -> (TaskFn, WatchFn) {
    debug!(%kind, count = ops.len(), %command, "render_group: called");
    let command: Arc<str> = Arc::from(command);
    let (tasks, watchers): (Vec<TaskFn>, Vec<WatchFn>) =
        ops.into_iter().map(|op| render(kind, command.clone(), op)).unzip();
    (join_tasks(tasks), join_watchers(watchers))
}
