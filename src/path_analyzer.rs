// src/path_analyzer.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Local filesystem analysis: existence checks, lazy recursive walks and tree sizes.
//!
//! Walks are plain iterators over [`PathEntry`]. Each call to [`walk`] or
//! [`walk_excluding`] starts a fresh traversal; nothing is cached between calls.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// One visited filesystem entry. Directories report size 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
    /// 0 for the walk root.
    pub depth: usize,
}

/// Glob patterns matched against the base name of each visited entry.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, glob::PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when `path`'s base name matches any pattern.
    pub fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy(),
            None => return false,
        };
        self.patterns.iter().any(|p| p.matches(&name))
    }
}

/// Fail with `PathNotFound` on the first path that does not exist. Empty input is fine.
pub fn validate_paths<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        std::fs::metadata(path).map_err(|e| Error::from_stat(path, e))?;
    }
    Ok(())
}

/// Lazy recursive walk of `root`, root included, following symlinks. Siblings are visited
/// in file-name order.
pub fn walk(root: &Path) -> impl Iterator<Item = Result<PathEntry>> + Send + use<> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .map(convert_entry)
}

/// Like [`walk`], but entries matching `exclude` are skipped and excluded directories are
/// not descended into. The root itself is subject to the patterns too.
pub fn walk_excluding<'a>(
    root: &Path,
    exclude: &'a ExcludeSet,
) -> impl Iterator<Item = Result<PathEntry>> + Send + use<'a> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            let skip = exclude.matches(entry.path());
            if skip {
                debug!("excluding {}", entry.path().display());
            }
            !skip
        })
        .map(convert_entry)
}

fn convert_entry(entry: walkdir::Result<DirEntry>) -> Result<PathEntry> {
    let entry = entry.map_err(|e| {
        let path = e.path().map(Path::to_path_buf).unwrap_or_default();
        Error::from_stat(path, std::io::Error::from(e))
    })?;
    let is_dir = entry.file_type().is_dir();
    let size = if is_dir {
        0
    } else {
        entry
            .metadata()
            .map_err(|e| Error::from_stat(entry.path(), std::io::Error::from(e)))?
            .len()
    };
    Ok(PathEntry {
        depth: entry.depth(),
        path: entry.into_path(),
        size,
        is_dir,
    })
}

/// Recursive byte size of one path.
pub fn path_size(path: &Path) -> Result<u64> {
    walk(path).try_fold(0u64, |acc, entry| Ok(acc + entry?.size))
}

/// Total size of several paths, validating each first.
pub fn total_size<P: AsRef<Path>>(paths: &[P]) -> Result<u64> {
    validate_paths(paths)?;
    paths
        .iter()
        .try_fold(0u64, |acc, p| Ok(acc + path_size(p.as_ref())?))
}

/// Name a source contributes as the top component of keys and archive entries.
/// Falls back to the canonical name for paths like `.` that have no file name.
pub(crate) fn source_name(path: &Path) -> String {
    if let Some(name) = path.file_name() {
        return name.to_string_lossy().into_owned();
    }
    std::fs::canonicalize(path)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// `entry` relative to `root`, as `/`-separated components.
pub(crate) fn relative_components(root: &Path, entry: &Path) -> Vec<String> {
    entry
        .strip_prefix(root)
        .unwrap_or(entry)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("README.md"), b"hello").unwrap();
        fs::write(root.join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(root.join("src/nested/lib.rs"), vec![7u8; 100]).unwrap();
        fs::write(root.join("target/app.bin"), vec![0u8; 1000]).unwrap();
        dir
    }

    #[test]
    fn validate_reports_missing_path() {
        let dir = tree();
        let good = dir.path().join("project");
        let bad = dir.path().join("nope.txt");
        assert!(validate_paths(&[&good]).is_ok());
        match validate_paths(&[good, bad.clone()]) {
            Err(Error::PathNotFound(p)) => assert_eq!(p, bad),
            other => panic!("expected PathNotFound, got {other:?}"),
        }
    }

    #[test]
    fn empty_list_is_a_no_op() {
        let none: [&Path; 0] = [];
        assert!(validate_paths(&none).is_ok());
        assert_eq!(total_size(&none).unwrap(), 0);
    }

    #[test]
    fn directories_contribute_zero() {
        let dir = tree();
        let root = dir.path().join("project");
        assert_eq!(path_size(&root).unwrap(), 5 + 12 + 100 + 1000);
        assert_eq!(path_size(&root.join("README.md")).unwrap(), 5);
        let dirs: Vec<_> = walk(&root)
            .filter_map(|e| e.ok())
            .filter(|e| e.is_dir)
            .collect();
        assert!(dirs.iter().all(|d| d.size == 0));
        assert_eq!(dirs.len(), 4);
    }

    #[test]
    fn walk_is_restartable() {
        let dir = tree();
        let root = dir.path().join("project");
        let first: Vec<_> = walk(&root).map(|e| e.unwrap().path).collect();
        let second: Vec<_> = walk(&root).map(|e| e.unwrap().path).collect();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0], root);
    }

    #[test]
    fn excluded_directories_are_not_descended() {
        let dir = tree();
        let root = dir.path().join("project");
        let exclude = ExcludeSet::new(&["target", "*.md"]).unwrap();
        let files: Vec<_> = walk_excluding(&root, &exclude)
            .map(|e| e.unwrap())
            .filter(|e| !e.is_dir)
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 2, "{files:?}");
        assert!(files.contains(&"main.rs".to_string()));
        assert!(files.contains(&"lib.rs".to_string()));
    }

    #[test]
    fn relative_components_use_root() {
        let root = Path::new("/data/project");
        let parts = relative_components(root, Path::new("/data/project/src/main.rs"));
        assert_eq!(parts, vec!["src", "main.rs"]);
        assert_eq!(source_name(root), "project");
    }
}
