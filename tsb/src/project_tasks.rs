//! Project-wide tasks, independent of any target
//!
//! | task                   | effect                                          |
//! |------------------------|-------------------------------------------------|
//! | `project:lint`         | lint the project sources                        |
//! | `project:lint:fix`     | lint and rewrite fixable problems in place      |
//! | `project:tslint.json`  | write the merged lint config to the root        |
//! | `project:tsconfig.json`| write a project tsconfig.json to the root       |
//! | `project:bump-<kind>`  | compute the next version and release it         |

use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::{EngineError, TaskRegistry};
use crate::glob::{self, MatcherPattern};
use crate::options::{DEV, merge_tiers};
use crate::project::ResolvedProject;
use crate::target::ToolCommands;
use crate::task::{LintOptions, TaskError, TaskFn, TsLocations, lint, task_fn, tsconfig_json};
use crate::vcs::Vcs;
use crate::version::{BumpKind, ReleaseOptions, get_next_version, release};

/// Prefix of every project-level task
pub const PROJECT_PREFIX: &str = "project";

fn lint_files(project: &ResolvedProject) -> Vec<MatcherPattern> {
    match &project.tslint.files {
        Some(files) => glob::join_all(&project.root, files),
        None => glob::join_all(&project.src_dir, &["**/*.ts"]),
    }
}

fn lint_options(project: &ResolvedProject, tools: &ToolCommands, fix: bool) -> LintOptions {
    let mut options = LintOptions::new(&tools.tslint, project.root.clone(), lint_files(project));
    options.user_config = project.tslint.config_path(&project.root);
    options.inline = project.tslint.inline_layer();
    options.fix = fix;
    options
}

fn write_tslint_json(options: LintOptions) -> TaskFn {
    let options = Arc::new(options);
    task_fn(move || {
        let options = options.clone();
        async move {
            let path = options.cwd.join("tslint.json");
            let rendered = options
                .merged_config()
                .await?
                .to_pretty_json()
                .map_err(|source| TaskError::Json {
                    path: path.clone(),
                    source,
                })?;
            tokio::fs::write(&path, rendered).await.map_err(|e| TaskError::io(&path, e))?;
            info!(?path, "Wrote tslint.json");
            Ok(())
        }
    })
}

fn bump_and_release(
    kind: BumpKind,
    project: ResolvedProject,
    options: ReleaseOptions,
    vcs: Arc<dyn Vcs>,
) -> TaskFn {
    let project = Arc::new(project);
    task_fn(move || {
        let project = project.clone();
        let options = options.clone();
        let vcs = vcs.clone();
        async move {
            let version = get_next_version(kind, &project).await?;
            info!(%kind, %version, "Releasing");
            release(&version, &project, vcs.as_ref(), &options).await
        }
    })
}

/// Register every project-level task
pub fn register_project_tasks(
    registry: &mut TaskRegistry,
    project: &ResolvedProject,
    tools: &ToolCommands,
    release_options: &ReleaseOptions,
    vcs: Arc<dyn Vcs>,
) -> Result<(), EngineError> {
    debug!(root = ?project.root, "register_project_tasks: called");
    let name = |suffix: &str| format!("{}:{}", PROJECT_PREFIX, suffix);

    registry.task(name("lint"), &[], lint(lint_options(project, tools, false)))?;
    registry.task(name("lint:fix"), &[], lint(lint_options(project, tools, true)))?;
    registry.task(name("tslint.json"), &[], write_tslint_json(lint_options(project, tools, false)))?;

    let tsconfig_path = project.root.join("tsconfig.json");
    let type_roots = vec![project.root.join("node_modules").join("@types")];
    let locations = TsLocations::new(
        &tsconfig_path,
        &project.src_dir,
        &project.build_dir,
        &type_roots,
        &glob::join_all(&project.src_dir, &["**/*.ts"]),
    );
    let options = merge_tiers(&*DEV, [project.typescript.as_ref()]);
    registry.task(name("tsconfig.json"), &[], tsconfig_json(tsconfig_path, options, locations))?;

    for kind in BumpKind::ALL {
        let task = bump_and_release(kind, project.clone(), release_options.clone(), vcs.clone());
        registry.task(name(&format!("bump-{}", kind)), &[], task)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::TslintOptions;
    use crate::project::{Project, resolve_project};
    use crate::vcs::testing::SpyVcs;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_task_names() {
        let project = resolve_project(&Project::new("/proj")).unwrap();
        let mut registry = TaskRegistry::new();
        register_project_tasks(
            &mut registry,
            &project,
            &ToolCommands::default(),
            &ReleaseOptions::default(),
            Arc::new(SpyVcs::clean("master")),
        )
        .unwrap();

        assert_eq!(
            registry.names(),
            vec![
                "project:bump-major",
                "project:bump-minor",
                "project:bump-patch",
                "project:lint",
                "project:lint:fix",
                "project:tsconfig.json",
                "project:tslint.json",
            ]
        );
    }

    #[test]
    fn test_lint_files_default_and_override() {
        let mut project = resolve_project(&Project::new("/proj")).unwrap();
        assert_eq!(lint_files(&project)[0].as_string(), "/proj/src/**/*.ts");

        project.tslint.files = Some(vec!["lib/**/*.ts".to_string(), "!lib/gen/**".to_string()]);
        let files: Vec<String> = lint_files(&project).iter().map(MatcherPattern::as_string).collect();
        assert_eq!(files, vec!["/proj/lib/**/*.ts", "!/proj/lib/gen/**"]);
    }

    #[tokio::test]
    async fn test_tslint_json_merges_inline_rules() {
        let temp = tempdir().unwrap();
        let mut project = Project::new(temp.path());
        project.tslint = Some(TslintOptions {
            rules: BTreeMap::from([("curly".to_string(), serde_json::json!(false))]),
            ..Default::default()
        });
        let project = resolve_project(&project).unwrap();

        let mut registry = TaskRegistry::new();
        register_project_tasks(
            &mut registry,
            &project,
            &ToolCommands::default(),
            &ReleaseOptions::default(),
            Arc::new(SpyVcs::clean("master")),
        )
        .unwrap();
        registry.run("project:tslint.json").await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp.path().join("tslint.json")).unwrap()).unwrap();
        assert_eq!(written["rules"]["curly"], serde_json::json!(false));
        assert_eq!(written["rules"]["eofline"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_bump_patch_releases_next_version() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("package.json"), "{\"name\": \"x\", \"version\": \"0.4.1\"}\n").unwrap();
        let project = resolve_project(&Project::new(temp.path())).unwrap();
        let vcs = Arc::new(SpyVcs::clean("master"));

        let mut registry = TaskRegistry::new();
        register_project_tasks(
            &mut registry,
            &project,
            &ToolCommands::default(),
            &ReleaseOptions::default(),
            vcs.clone(),
        )
        .unwrap();
        registry.run("project:bump-patch").await.unwrap();

        let manifest = fs::read_to_string(temp.path().join("package.json")).unwrap();
        assert!(manifest.contains("\"version\": \"0.4.2\""));
        assert!(vcs.calls().contains(&"tag v0.4.2 Release v0.4.2".to_string()));
    }
}
