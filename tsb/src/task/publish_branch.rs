//! Publish a directory as the content of a git branch (documentation deploys)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{TaskError, TaskFn, task_fn};
use crate::glob;
use crate::vcs::{GitCli, Vcs};

fn default_branch() -> String {
    "gh-pages".to_string()
}

fn default_message() -> String {
    "Deploy".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Branch publish settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BranchPublishOptions {
    /// Clone URL or path of the repository
    pub repository: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_message")]
    pub message: String,

    /// `Name <email>` override for the commit
    #[serde(default)]
    pub author: Option<String>,

    #[serde(default = "default_remote")]
    pub remote: String,
}

impl BranchPublishOptions {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: default_branch(),
            message: default_message(),
            author: None,
            remote: default_remote(),
        }
    }
}

async fn clear_worktree(dir: &Path) -> Result<(), TaskError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| TaskError::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| TaskError::io(dir, e))? {
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| TaskError::io(&path, e))?;
        let removed = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| TaskError::io(&path, e))?;
    }
    Ok(())
}

/// Copy every file under `from`, dotfiles included
async fn copy_tree(from: &Path, to: &Path) -> Result<usize, TaskError> {
    let mut count = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| TaskError::io(from, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let dest = to.join(glob::relative_path(from, entry.path()));
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(parent, e))?;
        }
        tokio::fs::copy(entry.path(), &dest)
            .await
            .map_err(|e| TaskError::io(entry.path(), e))?;
        count += 1;
    }
    Ok(count)
}

async fn publish(options: &BranchPublishOptions, content_dir: &Path) -> Result<(), TaskError> {
    // Dropped on every exit path, removing the clone
    let scratch = tempfile::Builder::new()
        .prefix("tsb-publish-")
        .tempdir()
        .map_err(|e| TaskError::io(std::env::temp_dir(), e))?;
    let checkout = scratch.path().join("repo");

    let git = GitCli::clone_shallow(&options.repository, &options.branch, &checkout).await?;
    clear_worktree(&checkout).await?;
    let count = copy_tree(content_dir, &checkout).await?;

    git.add_all().await?;
    if git.status_porcelain().await?.trim().is_empty() {
        info!(repository = %options.repository, branch = %options.branch, "Branch already up to date");
        return Ok(());
    }
    git.commit(&options.message, options.author.as_deref()).await?;
    git.push(&options.remote, &[format!("HEAD:{}", options.branch)]).await?;

    info!(count, repository = %options.repository, branch = %options.branch, "Published branch");
    Ok(())
}

/// Task replacing the content of `options.branch` with `content_dir`
pub fn publish_to_branch(content_dir: PathBuf, options: BranchPublishOptions) -> TaskFn {
    debug!(?content_dir, branch = %options.branch, "publish_to_branch: called");
    let inputs = Arc::new((content_dir, options));
    task_fn(move || {
        let inputs = inputs.clone();
        async move {
            let (content_dir, options) = &*inputs;
            publish(options, content_dir).await
        }
    })
}
