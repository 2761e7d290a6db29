//! Filesystem scanning helpers for ingestion passes.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::{GraphError, GraphResult};

use super::parser::language_for_path;

pub const DEFAULT_SENSITIVE_EXCLUDE_PATTERNS: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "*.p12",
    "*secret*",
    "*secrets*",
    "*credential*",
    "id_rsa",
    "id_dsa",
];

const IMPLICIT_IGNORED_DIRS: &[&str] = &[".git", ".depgraph"];

/// Project-local ignore file, read alongside `.gitignore`.
pub const IGNORE_FILE_NAME: &str = ".depgraphignore";

/// What to walk and what to leave out.
#[derive(Clone, Debug, Default)]
pub struct ScanOptions {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub exclude_sensitive: bool,
}

fn clean_pattern(pattern: &str) -> Option<&str> {
    let stripped = pattern.trim();
    if stripped.is_empty() {
        return None;
    }
    Some(stripped.strip_prefix("./").unwrap_or(stripped))
}

/// Source files under `repo_root` that a grammar handles, sorted.
pub fn iter_repo_files(repo_root: &Path, options: &ScanOptions) -> GraphResult<Vec<PathBuf>> {
    let mut overrides = OverrideBuilder::new(repo_root);
    let invalid =
        |pattern: &str, e: ignore::Error| GraphError::Parse(format!("invalid pattern {pattern:?}: {e}"));
    for pattern in options.include_patterns.iter().filter_map(|p| clean_pattern(p)) {
        overrides.add(pattern).map_err(|e| invalid(pattern, e))?;
    }
    let sensitive = options
        .exclude_sensitive
        .then_some(DEFAULT_SENSITIVE_EXCLUDE_PATTERNS)
        .unwrap_or_default();
    for pattern in options
        .exclude_patterns
        .iter()
        .filter_map(|p| clean_pattern(p))
        .chain(sensitive.iter().copied())
    {
        let negated = format!("!{pattern}");
        overrides.add(&negated).map_err(|e| invalid(pattern, e))?;
    }
    let overrides = overrides
        .build()
        .map_err(|e| GraphError::Parse(format!("invalid patterns: {e}")))?;

    let mut builder = WalkBuilder::new(repo_root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .add_custom_ignore_filename(IGNORE_FILE_NAME)
        .overrides(overrides)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|t| t.is_dir())
                && IMPLICIT_IGNORED_DIRS.contains(&name.as_ref()))
        });

    let mut files = Vec::new();
    for result in builder.build() {
        match result {
            Ok(entry) => {
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let path = entry.path();
                if language_for_path(path).is_none() {
                    continue;
                }
                files.push(path.to_path_buf());
            }
            Err(e) => warn!(error = %e, "failed to read entry"),
        }
    }
    files.sort();
    debug!(root = %repo_root.display(), files = files.len(), "scanned repository");
    Ok(files)
}

/// Repository-relative path with `/` separators.
pub fn relative_path(repo_root: &Path, path: &Path) -> String {
    path.strip_prefix(repo_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub fn detect_language(path: &str) -> Option<String> {
    let path = Path::new(path);
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    language_for_path(Path::new(&format!("x.{ext}"))).map(str::to_string)
}

pub fn compute_content_hash(path: &Path) -> GraphResult<String> {
    let data = std::fs::read(path)?;
    Ok(content_hash(&data))
}

pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
