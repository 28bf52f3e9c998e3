//! Source-file discovery with gitignore-aware filtering
//!
//! Walks a project directory for Python sources while respecting .gitignore
//! patterns. Discovered files are reported both as absolute paths (for
//! reading) and as root-relative keys (the form embedded in module vertex
//! ids and used throughout the symbol tables).

use anyhow::Context;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// The source files of one run, in filesystem-walk order.
#[derive(Debug, Clone)]
pub struct SourceFiles {
    /// Canonicalized root directory.
    pub root: PathBuf,
    /// Absolute paths of the discovered files.
    pub paths: Vec<PathBuf>,
}

impl SourceFiles {
    /// Root-relative path keys with `/` separators, in walk order.
    pub fn relative_keys(&self) -> Vec<String> {
        self.paths
            .iter()
            .filter_map(|p| p.strip_prefix(&self.root).ok())
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

/// Discover files matching glob patterns under `root`.
///
/// Hidden files are included; `.gitignore` and git exclude rules are
/// honored. Walk errors are reported to stderr and skipped.
pub fn discover_files(root: &Path, patterns: &[&str]) -> anyhow::Result<SourceFiles> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot canonicalize directory {}", root.display()))?;

    let matcher = build_glob_matcher(patterns).context("invalid glob pattern")?;

    let mut paths = Vec::new();
    for result in build_walker(&root) {
        match result {
            Ok(entry) => {
                let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
                if !is_file {
                    continue;
                }
                if let Ok(rel) = entry.path().strip_prefix(&root) {
                    if matcher.is_match(rel) {
                        paths.push(entry.into_path());
                    }
                }
            }
            Err(err) => {
                eprintln!("Warning: Error walking directory: {}", err);
            }
        }
    }

    Ok(SourceFiles { root, paths })
}

/// Discover Python files under `root` (convenience wrapper).
pub fn discover_python_files(root: &Path) -> anyhow::Result<SourceFiles> {
    discover_files(root, &["**/*.py"])
}

/// Compile the string patterns into a `GlobSet` for efficient matching.
fn build_glob_matcher(patterns: &[&str]) -> Result<globset::GlobSet, globset::Error> {
    use globset::GlobSetBuilder;

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(globset::Glob::new(pattern)?);
    }
    builder.build()
}

/// Build a walker with the ignore configuration used throughout.
fn build_walker(root: &Path) -> ignore::Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .git_exclude(true)
        .hidden(false)
        .parents(true);

    // Explicitly add .gitignore if it exists (needed for test environments
    // where WalkBuilder may not automatically discover it)
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        let _ = builder.add_ignore(gitignore_path);
    }

    builder.build()
}
