//! tsconfig.json generation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::{TaskError, TaskFn, task_fn};
use crate::glob::{self, MatcherPattern};
use crate::options::{CompilerOptions, Merge};

/// Locations written into a tsconfig.json, all relative to the file's directory
#[derive(Debug, Clone, PartialEq)]
pub struct TsLocations {
    pub tsconfig_dir: PathBuf,
    pub root_dir: String,
    pub out_dir: String,
    pub type_roots: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TsLocations {
    /// Express absolute target locations relative to `tsconfig_path`'s directory
    ///
    /// Negated script patterns become `exclude` entries, the rest `include`.
    pub fn new(
        tsconfig_path: &Path,
        src_dir: &Path,
        out_dir: &Path,
        type_roots: &[PathBuf],
        scripts: &[MatcherPattern],
    ) -> Self {
        debug!(?tsconfig_path, "TsLocations::new: called");
        let tsconfig_dir = tsconfig_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let rel = |path: &Path| glob::to_posix(&glob::relative_path(&tsconfig_dir, path));

        let (exclude, include): (Vec<&MatcherPattern>, Vec<&MatcherPattern>) =
            scripts
                .iter()
                .filter(|p| !p.is_comment() && !p.is_empty())
                .partition(|p| p.negated);

        Self {
            root_dir: rel(src_dir),
            out_dir: rel(out_dir),
            type_roots: type_roots.iter().map(|root| rel(root)).collect(),
            include: include
                .into_iter()
                .map(|p| glob::relative(&tsconfig_dir, p).glob)
                .collect(),
            exclude: exclude
                .into_iter()
                .map(|p| glob::relative(&tsconfig_dir, p).glob)
                .collect(),
            tsconfig_dir,
        }
    }
}

/// Serialized document; field order is the output order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TsconfigJson {
    pub compiler_options: CompilerOptions,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TsconfigJson {
    pub fn new(options: &CompilerOptions, locations: &TsLocations) -> Self {
        let located = CompilerOptions {
            root_dir: Some(locations.root_dir.clone()),
            out_dir: Some(locations.out_dir.clone()),
            type_roots: Some(locations.type_roots.clone()),
            ..Default::default()
        };
        Self {
            compiler_options: options.merge(&located),
            include: locations.include.clone(),
            exclude: locations.exclude.clone(),
        }
    }

    /// 2-space indented JSON with a trailing newline
    pub fn render(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

/// Write the tsconfig.json for `options`/`locations` to `path`
pub async fn write_tsconfig_json(
    path: &Path,
    options: &CompilerOptions,
    locations: &TsLocations,
) -> Result<(), TaskError> {
    let content = TsconfigJson::new(options, locations)
        .render()
        .map_err(|source| TaskError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TaskError::io(parent, e))?;
    }
    tokio::fs::write(path, content).await.map_err(|e| TaskError::io(path, e))?;
    info!(?path, "Wrote tsconfig.json");
    Ok(())
}

/// Task writing a tsconfig.json
pub fn tsconfig_json(path: PathBuf, options: CompilerOptions, locations: TsLocations) -> TaskFn {
    debug!(?path, "tsconfig_json: called");
    let inputs = Arc::new((path, options, locations));
    task_fn(move || {
        let inputs = inputs.clone();
        async move {
            let (path, options, locations) = &*inputs;
            write_tsconfig_json(path, options, locations).await
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DEV;
    use tempfile::tempdir;

    fn locations() -> TsLocations {
        TsLocations::new(
            Path::new("/proj/src/lib/tsconfig.json"),
            Path::new("/proj/src/lib"),
            Path::new("/proj/build/lib"),
            &[
                PathBuf::from("/proj/node_modules/@types"),
                PathBuf::from("/proj/src/lib/custom-typings"),
            ],
            &glob::join_all(Path::new("/proj/src/lib"), &["**/*.ts", "!**/*.spec.ts"]),
        )
    }

    #[test]
    fn test_locations_are_relative_to_tsconfig_dir() {
        let loc = locations();
        assert_eq!(loc.root_dir, ".");
        assert_eq!(loc.out_dir, "../../build/lib");
        assert_eq!(loc.type_roots, vec!["../../node_modules/@types", "custom-typings"]);
        assert_eq!(loc.include, vec!["**/*.ts"]);
        assert_eq!(loc.exclude, vec!["**/*.spec.ts"]);
    }

    #[test]
    fn test_empty_and_comment_patterns_are_dropped() {
        let mut scripts = glob::join_all(Path::new("/proj/src/lib"), &["**/*.ts", "", "# note", "!**/*.spec.ts"]);
        scripts.push(MatcherPattern::parse("!"));
        let loc = TsLocations::new(
            Path::new("/proj/src/lib/tsconfig.json"),
            Path::new("/proj/src/lib"),
            Path::new("/proj/build/lib"),
            &[],
            &scripts,
        );
        assert_eq!(loc.include, vec!["**/*.ts"]);
        assert_eq!(loc.exclude, vec!["**/*.spec.ts"]);
    }

    #[test]
    fn test_render_golden() {
        let options = CompilerOptions {
            module: Some("commonjs".to_string()),
            strict: Some(true),
            ..Default::default()
        };
        let rendered = TsconfigJson::new(&options, &locations()).render().unwrap();

        let expected = r#"{
  "compilerOptions": {
    "module": "commonjs",
    "outDir": "../../build/lib",
    "rootDir": ".",
    "strict": true,
    "typeRoots": [
      "../../node_modules/@types",
      "custom-typings"
    ]
  },
  "include": [
    "**/*.ts"
  ],
  "exclude": [
    "**/*.spec.ts"
  ]
}
"#;
        assert_eq!(rendered, expected);
    }

    #[tokio::test]
    async fn test_repeated_writes_are_byte_identical() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tsconfig.json");
        let task = tsconfig_json(path.clone(), DEV.clone(), locations());

        task().await.unwrap();
        let first = std::fs::read(&path).unwrap();
        task().await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with(b"}\n"));
    }
}
