//! npm publish

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Invocation, OutputMode, TaskError, TaskFn, run_tool, task_fn};

fn default_tag() -> String {
    "latest".to_string()
}

fn default_command() -> String {
    "npm".to_string()
}

/// Registry publish settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NpmPublishOptions {
    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default = "default_command")]
    pub command: String,
}

impl Default for NpmPublishOptions {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            command: default_command(),
        }
    }
}

impl NpmPublishOptions {
    fn invocation(&self, directory: &Path) -> Invocation {
        Invocation::new(&self.command)
            .args(["publish", "--tag", self.tag.as_str()])
            .cwd(directory)
            .output(OutputMode::Echo)
    }
}

/// Task running `<command> publish --tag <tag>` inside `directory`
pub fn npm_publish(directory: PathBuf, options: NpmPublishOptions) -> TaskFn {
    debug!(?directory, tag = %options.tag, "npm_publish: called");
    let inputs = Arc::new((directory, options));
    task_fn(move || {
        let inputs = inputs.clone();
        async move {
            let (directory, options) = &*inputs;
            run_tool(&options.invocation(directory), TaskError::Publish).await?;
            info!(?directory, tag = %options.tag, "Published package");
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let options: NpmPublishOptions = serde_yaml::from_str("{}").unwrap();
        assert_eq!(options, NpmPublishOptions::default());
        assert_eq!(options.tag, "latest");
        assert_eq!(options.command, "npm");
    }

    #[test]
    fn test_invocation() {
        let options = NpmPublishOptions {
            tag: "next".to_string(),
            ..Default::default()
        };
        let inv = options.invocation(Path::new("/proj/dist/lib"));
        assert_eq!(inv.program, "npm");
        assert_eq!(inv.args, vec!["publish", "--tag", "next"]);
        assert_eq!(inv.cwd, Some(PathBuf::from("/proj/dist/lib")));
    }

    #[tokio::test]
    async fn test_publish_failure() {
        let temp = tempdir().unwrap();
        let options = NpmPublishOptions {
            command: "false".to_string(),
            ..Default::default()
        };
        let err = npm_publish(temp.path().to_path_buf(), options)().await.unwrap_err();
        assert!(matches!(err, TaskError::Publish(_)));
    }
}
