//! Integration tests for tsbuild
//!
//! These tests go through the public API and the `tsb` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_cmd::Command;
use async_trait::async_trait;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

use tsbuild::config::{BuildConfig, Toggle};
use tsbuild::target::{DistOptions, FsProbe, LibTarget, TargetBase, register_lib_target, resolve_lib_target};
use tsbuild::task::PackageJsonMap;
use tsbuild::{GitError, Project, RealFs, TaskRegistry, Vcs, build_registry, resolve_project};

/// Records calls and answers from fixed values
#[derive(Default)]
struct RecordingVcs {
    calls: Mutex<Vec<String>>,
}

impl RecordingVcs {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl Vcs for RecordingVcs {
    async fn head_hash(&self) -> Result<String, GitError> {
        self.record("head_hash");
        Ok("0123456789abcdef".to_string())
    }

    async fn current_branch(&self) -> Result<String, GitError> {
        Ok("master".to_string())
    }

    async fn status_porcelain(&self) -> Result<String, GitError> {
        Ok(String::new())
    }

    async fn tag_exists(&self, _tag: &str) -> Result<bool, GitError> {
        Ok(false)
    }

    async fn add_all(&self) -> Result<(), GitError> {
        self.record("add");
        Ok(())
    }

    async fn commit(&self, message: &str, _author: Option<&str>) -> Result<(), GitError> {
        self.record(&format!("commit {}", message));
        Ok(())
    }

    async fn tag(&self, name: &str, _message: &str) -> Result<(), GitError> {
        self.record(&format!("tag {}", name));
        Ok(())
    }

    async fn push(&self, remote: &str, _refspecs: &[String]) -> Result<(), GitError> {
        self.record(&format!("push {}", remote));
        Ok(())
    }
}

/// No directory exists
struct NoDirs;

impl FsProbe for NoDirs {
    fn is_dir(&self, _path: &Path) -> bool {
        false
    }
}

const DESCRIPTOR: &str = r#"
project:
  root: /proj
targets:
  - kind: lib
    name: lib
    src-dir: src/lib
    main-module: index
    dist:
      npm-publish: { tag: next }
    typedoc:
      deploy: { repository: "git@example.com:org/lib.git" }
  - kind: node
    name: server
    main-module: main
    tsconfig-json: null
  - kind: mocha
    name: test
    src-dir: src/test
  - kind: webpack
    name: app
    main-module: main
    sass:
      - { name: styles }
"#;

fn registry_from(descriptor: &str) -> TaskRegistry {
    let config = BuildConfig::parse(descriptor).unwrap();
    build_registry(&config, &NoDirs, Arc::new(RecordingVcs::default())).unwrap()
}

// =============================================================================
// Task graph
// =============================================================================

#[test]
fn test_every_target_registers_its_scheme() {
    let registry = registry_from(DESCRIPTOR);

    let expected = [
        "lib:build",
        "lib:build:scripts",
        "lib:build:copy",
        "lib:clean",
        "lib:watch",
        "lib:tsconfig.json",
        "lib:dist",
        "lib:dist:copy",
        "lib:dist:copy-src",
        "lib:dist:scripts",
        "lib:dist:package.json",
        "lib:dist:publish",
        "lib:typedoc",
        "lib:typedoc:deploy",
        "server",
        "server:run",
        "test",
        "test:run",
        "test:coverage",
        "app:build:webpack",
        "app:build:sass",
        "project:lint",
        "project:bump-major",
    ];
    for name in expected {
        assert!(registry.contains(name), "missing {}", name);
    }
    assert!(!registry.contains("lib:dist:copy-custom-typings"));
    assert!(!registry.contains("server:tsconfig.json"));
    assert!(!registry.contains("app:build:pug"));
}

#[test]
fn test_plan_orders_dependencies_first() {
    let registry = registry_from(DESCRIPTOR);

    assert_eq!(
        registry.execution_order("lib:dist:publish").unwrap(),
        vec![
            "lib:dist:copy",
            "lib:dist:copy-src",
            "lib:dist:scripts",
            "lib:dist:package.json",
            "lib:dist",
            "lib:dist:publish",
        ]
    );
    assert_eq!(
        registry.execution_order("app:build").unwrap(),
        vec![
            "app:build:scripts",
            "app:build:webpack",
            "app:build:copy",
            "app:build:sass",
            "app:build",
        ]
    );
}

#[test]
fn test_missing_main_module_fails_before_any_task() {
    let config = BuildConfig::parse("project: {root: /proj}\ntargets:\n  - {kind: node, name: server}\n").unwrap();
    let err = build_registry(&config, &NoDirs, Arc::new(RecordingVcs::default())).unwrap_err();
    assert!(err.to_string().contains("main-module"), "{}", err);
}

// =============================================================================
// Generated files
// =============================================================================

#[tokio::test]
async fn test_dist_package_json_is_stamped_and_mapped() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("package.json"),
        "{\"name\": \"lib\", \"version\": \"1.0.0\", \"private\": true, \"devDependencies\": {\"tsc\": \"*\"}}\n",
    )
    .unwrap();

    let project = resolve_project(&Project::new(temp.path())).unwrap();
    let target = LibTarget {
        base: TargetBase::new("lib"),
        main_module: Some("lib/index".to_string()),
        dist: Toggle::Options(DistOptions {
            package_json_map: PackageJsonMap::new(|mut manifest: Value| {
                if let Some(object) = manifest.as_object_mut() {
                    object.remove("private");
                    object.remove("devDependencies");
                }
                manifest
            }),
            ..Default::default()
        }),
        typedoc: None,
    };
    let resolved = resolve_lib_target(&project, &target, &RealFs).unwrap();
    let vcs = Arc::new(RecordingVcs::default());
    let mut registry = TaskRegistry::new();
    register_lib_target(&mut registry, &resolved, vcs.clone()).unwrap();

    registry.run("lib:dist:package.json").await.unwrap();

    let written = fs::read_to_string(temp.path().join("dist/lib/package.json")).unwrap();
    let manifest: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(
        manifest,
        json!({
            "name": "lib",
            "version": "1.0.0",
            "main": "lib/index.js",
            "types": "lib/index.d.ts",
            "gitHead": "0123456789abcdef",
        })
    );
    assert!(written.ends_with("}\n"));
    assert_eq!(vcs.calls(), vec!["head_hash"]);
}

#[tokio::test]
async fn test_tsconfig_json_is_written_relative_to_its_directory() {
    let temp = TempDir::new().unwrap();
    let descriptor = format!(
        "project:\n  root: {}\ntargets:\n  - {{kind: lib, name: lib, src-dir: src/lib, scripts: ['**/*.ts', '!**/*.spec.ts']}}\n",
        temp.path().display()
    );
    let registry = registry_from(&descriptor);

    registry.run("lib:tsconfig.json").await.unwrap();

    let path: PathBuf = temp.path().join("src/lib/tsconfig.json");
    let written: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written["include"], json!(["**/*.ts"]));
    assert_eq!(written["exclude"], json!(["**/*.spec.ts"]));
    assert_eq!(written["compilerOptions"]["outDir"], json!("../../build/lib"));
}

// =============================================================================
// Command line
// =============================================================================

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("tsbuild.yml"),
        "project:\n  root: .\ntargets:\n  - {kind: lib, name: lib, main-module: index, dist: true}\n",
    )
    .unwrap();
    fs::write(temp.path().join("package.json"), "{\"name\": \"lib\", \"version\": \"1.2.3\"}\n").unwrap();
    temp
}

fn tsb(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tsb").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_cli_list() {
    let temp = workspace();
    tsb(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("lib:dist:package.json"))
        .stdout(predicate::str::contains("project:bump-patch"));
}

#[test]
fn test_cli_plan() {
    let temp = workspace();
    tsb(temp.path())
        .args(["plan", "lib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown task: lib"));

    tsb(temp.path())
        .args(["plan", "lib:build"])
        .assert()
        .success()
        .stdout("lib:build:scripts\nlib:build:copy\nlib:build\n");
}

#[test]
fn test_cli_next_version() {
    let temp = workspace();
    tsb(temp.path())
        .args(["next-version", "minor"])
        .assert()
        .success()
        .stdout("1.3.0\n");
}

#[test]
fn test_cli_rejects_unknown_kind() {
    let temp = workspace();
    fs::write(
        temp.path().join("custom.yml"),
        "project: {root: .}\ntargets:\n  - {kind: rollup, name: app}\n",
    )
    .unwrap();
    tsb(temp.path())
        .args(["--config", "custom.yml", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown kind `rollup`"));
}
