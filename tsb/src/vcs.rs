//! Version-control plumbing
//!
//! Release and branch-publish tasks talk to git through the [`Vcs`] trait so
//! their ordering can be verified without a repository. [`GitCli`] is the
//! real implementation, shelling out to `git`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors from git operations and release pre-conditions
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Tag {0} already exists")]
    TagExists(String),

    #[error("Working tree has uncommitted changes:\n{0}")]
    DirtyTree(String),

    #[error("Branch {branch} is not one of the allowed branches ({allowed})")]
    WrongBranch { branch: String, allowed: String },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The git operations used by tasks
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Full hash of `HEAD`
    async fn head_hash(&self) -> Result<String, GitError>;

    async fn current_branch(&self) -> Result<String, GitError>;

    /// `git status --porcelain` output; empty when clean
    async fn status_porcelain(&self) -> Result<String, GitError>;

    async fn tag_exists(&self, tag: &str) -> Result<bool, GitError>;

    /// Stage the whole working tree
    async fn add_all(&self) -> Result<(), GitError>;

    /// Commit staged changes, optionally overriding the author (`Name <email>`)
    async fn commit(&self, message: &str, author: Option<&str>) -> Result<(), GitError>;

    /// Create an annotated tag
    async fn tag(&self, name: &str, message: &str) -> Result<(), GitError>;

    async fn push(&self, remote: &str, refspecs: &[String]) -> Result<(), GitError>;
}

/// Fail with [`GitError::TagExists`] if `tag` is present
pub async fn ensure_tag_absent(vcs: &dyn Vcs, tag: &str) -> Result<(), GitError> {
    debug!(%tag, "ensure_tag_absent: called");
    if vcs.tag_exists(tag).await? {
        return Err(GitError::TagExists(tag.to_string()));
    }
    Ok(())
}

/// Fail unless on one of `allowed` (any branch when empty) with a clean tree
pub async fn ensure_clean_branch(vcs: &dyn Vcs, allowed: &[String]) -> Result<(), GitError> {
    debug!(?allowed, "ensure_clean_branch: called");
    let branch = vcs.current_branch().await?;
    if !allowed.is_empty() && !allowed.iter().any(|name| *name == branch) {
        return Err(GitError::WrongBranch {
            branch,
            allowed: allowed.join(", "),
        });
    }

    let status = vcs.status_porcelain().await?;
    if !status.trim().is_empty() {
        return Err(GitError::DirtyTree(status.trim_end().to_string()));
    }
    Ok(())
}

/// [`Vcs`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        let repo = repo.into();
        debug!(?repo, "GitCli::new: called");
        Self { repo }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Clone `branch` of `repository` into `dest` with depth 1
    pub async fn clone_shallow(repository: &str, branch: &str, dest: &Path) -> Result<Self, GitError> {
        debug!(%repository, %branch, ?dest, "GitCli::clone_shallow: called");
        let dest_arg = dest.to_string_lossy();
        run_git(
            None,
            &["clone", "--depth", "1", "--branch", branch, repository, dest_arg.as_ref()],
        )
        .await?;
        info!(%repository, %branch, "Cloned branch");
        Ok(Self::new(dest))
    }

    async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        run_git(Some(&self.repo), args).await
    }
}

async fn run_git(cwd: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
    debug!(?cwd, ?args, "run_git: called");
    let mut command = Command::new("git");
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    let output = command.output().await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(%stderr, "run_git: command failed");
        return Err(GitError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            stderr,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[async_trait]
impl Vcs for GitCli {
    async fn head_hash(&self) -> Result<String, GitError> {
        Ok(self.git(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    async fn current_branch(&self) -> Result<String, GitError> {
        Ok(self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?.trim().to_string())
    }

    async fn status_porcelain(&self) -> Result<String, GitError> {
        self.git(&["status", "--porcelain"]).await
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool, GitError> {
        let listed = self.git(&["tag", "--list", tag]).await?;
        Ok(listed.lines().any(|line| line.trim() == tag))
    }

    async fn add_all(&self) -> Result<(), GitError> {
        self.git(&["add", "."]).await.map(drop)
    }

    async fn commit(&self, message: &str, author: Option<&str>) -> Result<(), GitError> {
        let mut args = vec!["commit", "--message", message];
        if let Some(author) = author {
            args.extend(["--author", author]);
        }
        self.git(&args).await.map(drop)
    }

    async fn tag(&self, name: &str, message: &str) -> Result<(), GitError> {
        self.git(&["tag", "--annotate", name, "--message", message]).await.map(drop)
    }

    async fn push(&self, remote: &str, refspecs: &[String]) -> Result<(), GitError> {
        let mut args = vec!["push", remote];
        args.extend(refspecs.iter().map(String::as_str));
        self.git(&args).await.map(drop)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Recording fake; every call is appended to `calls`
    #[derive(Debug, Default)]
    pub struct SpyVcs {
        pub calls: Mutex<Vec<String>>,
        pub head: String,
        pub branch: String,
        pub status: String,
        pub tags: Vec<String>,
    }

    impl SpyVcs {
        pub fn clean(branch: &str) -> Self {
            Self {
                head: "0123456789abcdef".to_string(),
                branch: branch.to_string(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Vcs for SpyVcs {
        async fn head_hash(&self) -> Result<String, GitError> {
            self.record("head_hash".to_string());
            Ok(self.head.clone())
        }

        async fn current_branch(&self) -> Result<String, GitError> {
            self.record("current_branch".to_string());
            Ok(self.branch.clone())
        }

        async fn status_porcelain(&self) -> Result<String, GitError> {
            self.record("status".to_string());
            Ok(self.status.clone())
        }

        async fn tag_exists(&self, tag: &str) -> Result<bool, GitError> {
            self.record(format!("tag_exists {}", tag));
            Ok(self.tags.iter().any(|t| t == tag))
        }

        async fn add_all(&self) -> Result<(), GitError> {
            self.record("add".to_string());
            Ok(())
        }

        async fn commit(&self, message: &str, _author: Option<&str>) -> Result<(), GitError> {
            self.record(format!("commit {}", message));
            Ok(())
        }

        async fn tag(&self, name: &str, message: &str) -> Result<(), GitError> {
            self.record(format!("tag {} {}", name, message));
            Ok(())
        }

        async fn push(&self, remote: &str, refspecs: &[String]) -> Result<(), GitError> {
            self.record(format!("push {} {}", remote, refspecs.join(" ")));
            Ok(())
        }
    }
}
