//! Lint rule configuration and its layering

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

/// A tslint.json document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TslintConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules_directory: Vec<String>,

    #[serde(default)]
    pub rules: BTreeMap<String, Value>,
}

impl TslintConfig {
    /// Layer `user` over `self`; user rules win per key
    pub fn extend(&self, user: &TslintConfig) -> TslintConfig {
        debug!(user_rules = user.rules.len(), "TslintConfig::extend: called");
        let mut rules = self.rules.clone();
        rules.extend(user.rules.iter().map(|(k, v)| (k.clone(), v.clone())));

        TslintConfig {
            extends: union(&self.extends, &user.extends),
            rules_directory: union(&self.rules_directory, &user.rules_directory),
            rules,
        }
    }

    /// Pretty JSON with a trailing newline
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

fn union(base: &[String], extra: &[String]) -> Vec<String> {
    let mut out = base.to_vec();
    for item in extra {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Lint settings of a project descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TslintOptions {
    /// Path to a tslint.json, relative to the project root
    pub config: Option<PathBuf>,

    /// Inline rules applied after `config`
    pub rules: BTreeMap<String, Value>,

    /// Source patterns to lint, relative to the project root
    pub files: Option<Vec<String>>,
}

impl TslintOptions {
    /// Path of the user configuration, anchored at `root`
    pub fn config_path(&self, root: &Path) -> Option<PathBuf> {
        self.config.as_ref().map(|path| root.join(path))
    }

    /// Inline rules as a config layer
    pub fn inline_layer(&self) -> TslintConfig {
        TslintConfig {
            rules: self.rules.clone(),
            ..Default::default()
        }
    }
}

/// Built-in rule set
pub static DEFAULT_TSLINT: LazyLock<TslintConfig> = LazyLock::new(|| {
    let rules: BTreeMap<String, Value> = [
        ("align", json!([true, "parameters", "statements"])),
        ("arrow-parens", json!(true)),
        ("class-name", json!(true)),
        ("comment-format", json!([true, "check-space"])),
        ("curly", json!(true)),
        ("eofline", json!(true)),
        ("indent", json!([true, "spaces", 2])),
        ("max-line-length", json!([true, 120])),
        ("member-access", json!(true)),
        ("no-consecutive-blank-lines", json!(true)),
        ("no-trailing-whitespace", json!(true)),
        ("no-unused-expression", json!(true)),
        ("no-var-keyword", json!(true)),
        ("object-literal-sort-keys", json!(false)),
        ("prefer-const", json!(true)),
        ("quotemark", json!([true, "double", "avoid-escape"])),
        ("semicolon", json!([true, "always"])),
        ("trailing-comma", json!([true, {"multiline": "always", "singleline": "never"}])),
        ("triple-equals", json!([true, "allow-null-check"])),
        ("typedef", json!([true, "call-signature"])),
        (
            "whitespace",
            json!([true, "check-branch", "check-decl", "check-operator", "check-separator", "check-type"]),
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    TslintConfig {
        rules,
        ..Default::default()
    }
});
