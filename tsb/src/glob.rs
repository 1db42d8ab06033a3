//! Glob pattern rebasing and file expansion
//!
//! Patterns are minimatch-style strings with `/` separators. A leading `!`
//! negates a pattern; the negation flag is kept apart from the path part so
//! rebasing a pattern onto another directory never disturbs it.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use thiserror::Error;
use tracing::debug;

/// Errors raised while compiling or expanding glob patterns
#[derive(Debug, Error)]
pub enum GlobError {
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to read matched path: {0}")]
    Walk(#[from] glob::GlobError),
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A single glob pattern with its negation split out
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatcherPattern {
    pub negated: bool,
    pub glob: String,
}

impl MatcherPattern {
    /// Parse the textual form. Every leading `!` toggles negation.
    pub fn parse(pattern: &str) -> Self {
        let mut negated = false;
        let mut rest = pattern;
        while let Some(stripped) = rest.strip_prefix('!') {
            negated = !negated;
            rest = stripped;
        }
        Self {
            negated,
            glob: rest.to_string(),
        }
    }

    pub fn positive(glob: impl Into<String>) -> Self {
        Self {
            negated: false,
            glob: glob.into(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.glob.starts_with('/')
    }

    /// `#` patterns are comments and match nothing
    pub fn is_comment(&self) -> bool {
        self.glob.starts_with('#')
    }

    pub fn is_empty(&self) -> bool {
        self.glob.is_empty()
    }

    /// Render back to the textual glob form
    pub fn as_string(&self) -> String {
        if self.negated {
            format!("!{}", self.glob)
        } else {
            self.glob.clone()
        }
    }
}

impl fmt::Display for MatcherPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<&str> for MatcherPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

/// Anchor `pattern` at `base` unless it is absolute, a comment or empty
pub fn join(base: &Path, pattern: &MatcherPattern) -> MatcherPattern {
    if pattern.is_empty() || pattern.is_comment() || pattern.is_absolute() {
        return pattern.clone();
    }
    let joined = format!("{}/{}", to_posix(base), pattern.glob);
    MatcherPattern {
        negated: pattern.negated,
        glob: normalize_posix(&joined),
    }
}

/// Inverse of [`join`]: express an absolute pattern relative to `from`
pub fn relative(from: &Path, pattern: &MatcherPattern) -> MatcherPattern {
    if pattern.is_empty() || pattern.is_comment() || !pattern.is_absolute() {
        return pattern.clone();
    }
    let from = normalize_posix(&to_posix(from));
    let target = normalize_posix(&pattern.glob);
    MatcherPattern {
        negated: pattern.negated,
        glob: relative_posix(&from, &target),
    }
}

/// Convenience over [`join`] for a list of textual patterns
pub fn join_all<S: AsRef<str>>(base: &Path, patterns: &[S]) -> Vec<MatcherPattern> {
    patterns
        .iter()
        .map(|pattern| join(base, &MatcherPattern::parse(pattern.as_ref())))
        .collect()
}

/// Render a path with forward slashes
pub fn to_posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// A segment naming exactly one directory: no wildcard and not `..`
fn is_literal_segment(segment: &str) -> bool {
    segment != ".." && !segment.contains(['*', '?', '[', '{'])
}

/// Lexically normalize a `/`-separated path, resolving `.` and `..`
///
/// `..` only cancels a literal segment; after a wildcard segment it is kept.
pub fn normalize_posix(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if is_literal_segment(last) => {
                    parts.pop();
                }
                Some(_) => parts.push(".."),
                // `..` above the root stays at the root
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let body = parts.join("/");
    match (absolute, body.is_empty()) {
        (true, _) => format!("/{}", body),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

fn relative_posix(from: &str, to: &str) -> String {
    let from_parts: Vec<&str> = from.split('/').filter(|p| !p.is_empty()).collect();
    let to_parts: Vec<&str> = to.split('/').filter(|p| !p.is_empty()).collect();
    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat_n("..", from_parts.len() - common).collect();
    parts.extend(&to_parts[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Lexical relative path between two absolute paths
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = normalize_path(from);
    let to = normalize_path(to);
    PathBuf::from(relative_posix(&to_posix(&from), &to_posix(&to)))
}

/// Lexically normalize a filesystem path without touching the disk
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Compiled include/exclude sets for a list of patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    include: Vec<(String, Pattern)>,
    exclude: Vec<Pattern>,
}

impl PatternSet {
    pub fn compile(patterns: &[MatcherPattern]) -> Result<Self, GlobError> {
        debug!(count = patterns.len(), "PatternSet::compile: called");
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for pattern in patterns {
            if pattern.is_empty() || pattern.is_comment() {
                continue;
            }
            let compiled = Pattern::new(&pattern.glob).map_err(|source| GlobError::InvalidPattern {
                pattern: pattern.as_string(),
                source,
            })?;
            if pattern.negated {
                exclude.push(compiled);
            } else {
                include.push((pattern.glob.clone(), compiled));
            }
        }
        Ok(Self { include, exclude })
    }

    /// True when some positive pattern matches and no negated one does
    pub fn matches(&self, path: &Path) -> bool {
        self.include
            .iter()
            .any(|(_, pattern)| pattern.matches_path_with(path, MATCH_OPTIONS))
            && !self.is_excluded(path)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude
            .iter()
            .any(|pattern| pattern.matches_path_with(path, MATCH_OPTIONS))
    }

    /// Walk the filesystem and return every matched regular file, sorted
    pub fn expand(&self) -> Result<Vec<PathBuf>, GlobError> {
        debug!(includes = self.include.len(), "PatternSet::expand: called");
        let mut files = BTreeSet::new();
        for (glob, _) in &self.include {
            let entries = glob::glob_with(glob, MATCH_OPTIONS).map_err(|source| GlobError::InvalidPattern {
                pattern: glob.clone(),
                source,
            })?;
            for entry in entries {
                let path = entry?;
                if path.is_file() && !self.is_excluded(&path) {
                    files.insert(path);
                }
            }
        }
        debug!(matched = files.len(), "PatternSet::expand: done");
        Ok(files.into_iter().collect())
    }
}

/// Expand patterns to the sorted list of matching files
pub fn expand(patterns: &[MatcherPattern]) -> Result<Vec<PathBuf>, GlobError> {
    PatternSet::compile(patterns)?.expand()
}
