//! Result file discovery.
//!
//! This module resolves the configured path patterns into the ordered list
//! of files that the orchestrator imports, and infers a content type for
//! each one.
//!
//! # Pattern Syntax
//!
//! Patterns are newline-separated globs:
//!
//! ```text
//! reports/**/*.xml          # include every XML report below reports/
//! !reports/**/draft-*.xml   # exclude drafts
//! # comments and blank lines are ignored
//! ```
//!
//! `*` and `?` never cross a `/`, `**` matches any number of directories.
//! A pattern without glob characters names a file, or a directory whose
//! files are all included.
//!
//! # Ordering
//!
//! Results are deduplicated and sorted by path. That order is the input
//! order of the batch: the first file is the one used for a seed import.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

/// Content type used when the extension gives no useful hint.
pub const DEFAULT_CONTENT_TYPE: &str = "application/xml";

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors that can occur while resolving path patterns.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// A pattern could not be compiled.
    #[error("Invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The pattern list contained no include patterns.
    #[error("No include patterns given")]
    NoPatterns,

    /// A directory could not be walked.
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A result file scheduled for import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFile {
    /// Path of the file, as resolved from the pattern.
    pub path: PathBuf,

    /// MIME type sent along with the file content.
    pub content_type: String,
}

impl ImportFile {
    /// Creates a descriptor, inferring the content type from the extension.
    ///
    /// ```
    /// use xray_import::discovery::ImportFile;
    ///
    /// let file = ImportFile::new("results/cucumber.json");
    /// assert_eq!(file.content_type, "application/json");
    ///
    /// let file = ImportFile::new("results/TEST-suite");
    /// assert_eq!(file.content_type, "application/xml");
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = content_type_for(&path).to_string();
        Self { path, content_type }
    }

    /// Creates a descriptor with an explicit content type.
    pub fn with_content_type(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
        }
    }
}

/// Infers a MIME type from a file extension.
///
/// Falls back to [`DEFAULT_CONTENT_TYPE`] for unknown or missing
/// extensions, since most result formats are XML.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("xml") | Some("trx") => "application/xml",
        Some("json") => "application/json",
        Some("zip") => "application/zip",
        Some("txt") | Some("log") | Some("feature") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Resolves newline-separated patterns into an ordered file list.
///
/// Symbolic links are not followed while walking directories. Roots that
/// do not exist contribute no files.
///
/// # Errors
///
/// Returns an error if a pattern is invalid, no include pattern is given,
/// or an existing directory cannot be read.
///
/// # Example
///
/// ```no_run
/// use xray_import::discovery::discover_files;
///
/// let files = discover_files("reports/**/*.xml\n!reports/**/draft-*.xml")?;
/// for file in &files {
///     println!("{} ({})", file.path.display(), file.content_type);
/// }
/// # Ok::<(), xray_import::discovery::DiscoveryError>(())
/// ```
pub fn discover_files(patterns: &str) -> DiscoveryResult<Vec<ImportFile>> {
    let mut includes = Vec::new();
    let mut excludes = Vec::new();

    for line in patterns.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.strip_prefix('!') {
            Some(excluded) => excludes.push(normalize_pattern(excluded.trim())),
            None => includes.push(normalize_pattern(line)),
        }
    }

    if includes.is_empty() {
        return Err(DiscoveryError::NoPatterns);
    }

    let exclude_set = build_exclude_set(&excludes)?;
    let mut found = BTreeSet::new();

    for pattern in &includes {
        for path in resolve_pattern(pattern)? {
            if exclude_set.is_match(&path) {
                debug!("Excluded {}", path.display());
                continue;
            }
            found.insert(path);
        }
    }

    Ok(found.into_iter().map(ImportFile::new).collect())
}

fn normalize_pattern(pattern: &str) -> String {
    pattern.strip_prefix("./").unwrap_or(pattern).to_string()
}

fn is_glob(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// The leading part of a pattern that contains no glob characters.
fn literal_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(pattern).components() {
        match component {
            Component::Normal(part) if is_glob(&part.to_string_lossy()) => break,
            other => root.push(other.as_os_str()),
        }
    }
    if root.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        root
    }
}

fn compile(pattern: &str) -> DiscoveryResult<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| DiscoveryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn build_exclude_set(excludes: &[String]) -> DiscoveryResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in excludes {
        builder.add(compile(pattern)?);
        // A literal or directory pattern also excludes everything below it.
        builder.add(compile(&format!("{}/**", pattern.trim_end_matches('/')))?);
    }
    builder.build().map_err(|e| DiscoveryError::InvalidPattern {
        pattern: excludes.join(", "),
        reason: e.to_string(),
    })
}

fn resolve_pattern(pattern: &str) -> DiscoveryResult<Vec<PathBuf>> {
    let root = literal_root(pattern);

    if !root.exists() {
        debug!("Pattern root {} does not exist", root.display());
        return Ok(Vec::new());
    }

    if !is_glob(pattern) {
        if root.is_file() {
            return Ok(vec![root]);
        }
        return walk_files(&root, |_| true);
    }

    let matcher = compile(pattern)?.compile_matcher();
    walk_files(&root, |path| matcher.is_match(path))
}

fn walk_files(root: &Path, accept: impl Fn(&Path) -> bool) -> DiscoveryResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        let file_type = entry.file_type();
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let path = if root == Path::new(".") {
            entry
                .path()
                .strip_prefix(".")
                .unwrap_or(entry.path())
                .to_path_buf()
        } else {
            entry.path().to_path_buf()
        };

        if accept(&path) {
            files.push(path);
        }
    }

    Ok(files)
}
