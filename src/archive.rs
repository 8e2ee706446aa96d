// src/archive.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Zip archives of local files and folders, built for a single upload.
//!
//! Entry naming:
//! - a file source becomes one entry named after its base name;
//! - a directory source contributes every file below it, named relative to the source's
//!   parent, so the top-level directory name is kept (`project/src/main.rs`).
//!
//! Only files become entries. Exclusion patterns match base names and prune whole
//! directories.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::constants::{ARCHIVE_EXTENSION, ARCHIVE_SCRATCH_PREFIX, ARCHIVE_TIMESTAMP_FORMAT};
use crate::error::{Error, Result};
use crate::models::ArchiveInfo;
use crate::path_analyzer::{self, ExcludeSet};
use crate::remote_path::join_components;

const DEFLATE_LEVEL: i64 = 9;
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Default archive file name for `sources`.
///
/// One source: `<stem>_<YYYYMMDD_HHMMSS><ext>`. Otherwise `archive_<YYYYMMDD_HHMMSS><ext>`.
pub fn generate_archive_name<P: AsRef<Path>>(sources: &[P], extension: &str) -> String {
    let ts = Utc::now().format(ARCHIVE_TIMESTAMP_FORMAT);
    let ext = normalize_extension(extension);
    let base = match sources {
        [single] => single
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty() && s != "." && s != "..")
            .unwrap_or_else(|| "archive".to_string()),
        _ => "archive".to_string(),
    };
    format!("{base}_{ts}{ext}")
}

/// Caller-chosen archive name; `.zip` is appended when the name lacks it.
pub fn custom_archive_name(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{ARCHIVE_EXTENSION}")
    }
}

fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{extension}")
    }
}

/// Build a zip at `output` from `sources`, skipping entries matching `exclude`.
///
/// On error the file at `output` may exist but is not a valid archive; removing it is up
/// to the caller (see [`TempArchive`]).
pub fn create_archive<P, S>(sources: &[P], output: &Path, exclude: &[S]) -> Result<ArchiveInfo>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let fail = |reason: String| Error::ArchiveCreationFailed {
        path: output.to_path_buf(),
        reason,
    };

    let exclude = ExcludeSet::new(exclude).map_err(|e| fail(format!("invalid exclude pattern: {e}")))?;
    path_analyzer::validate_paths(sources).map_err(|e| fail(e.to_string()))?;

    let created_at = Utc::now();
    let file = File::create(output).map_err(|e| fail(format!("cannot create archive file: {e}")))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let mut original_size = 0u64;
    let mut entries = 0usize;
    for source in sources {
        let source = source.as_ref();
        let (bytes, count) = add_source(&mut zip, source, &exclude)
            .map_err(|e| fail(format!("failed to add {}: {e:#}", source.display())))?;
        original_size += bytes;
        entries += count;
    }

    let mut writer = zip
        .finish()
        .map_err(|e| fail(format!("failed to finalize archive: {e}")))?;
    writer
        .flush()
        .map_err(|e| fail(format!("failed to flush archive: {e}")))?;
    drop(writer);

    let compressed_size = fs::metadata(output)
        .map_err(|e| fail(format!("failed to stat archive: {e}")))?
        .len();
    let compression_ratio = if original_size > 0 {
        compressed_size as f64 / original_size as f64
    } else {
        0.0
    };

    info!(
        "archived {} file(s) from {} source(s): {} -> {} bytes ({:.2})",
        entries,
        sources.len(),
        original_size,
        compressed_size,
        compression_ratio
    );

    Ok(ArchiveInfo {
        archive_path: output.to_path_buf(),
        original_paths: sources.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        compressed_size,
        original_size,
        compression_ratio,
        entries,
        created_at,
    })
}

/// Write every non-excluded file under `source`. Returns (uncompressed bytes, entries).
fn add_source<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    source: &Path,
    exclude: &ExcludeSet,
) -> anyhow::Result<(u64, usize)> {
    let top = path_analyzer::source_name(source);
    let mut bytes = 0u64;
    let mut count = 0usize;

    for entry in path_analyzer::walk_excluding(source, exclude) {
        let entry = entry?;
        if entry.is_dir {
            continue;
        }
        let name = if entry.depth == 0 {
            top.clone()
        } else {
            let rel = path_analyzer::relative_components(source, &entry.path);
            join_components(std::iter::once(top.as_str()).chain(rel.iter().map(String::as_str)))
        };

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(DEFLATE_LEVEL))
            .large_file(entry.size >= ZIP64_THRESHOLD);

        debug!("adding {} as {}", entry.path.display(), name);
        zip.start_file(name, options)?;
        let mut input = File::open(&entry.path)?;
        bytes += io::copy(&mut input, zip)?;
        count += 1;
    }
    Ok((bytes, count))
}

/// Scratch directory holding one upload archive. Dropping it removes the directory and
/// everything in it; a failed removal is logged and otherwise ignored.
pub struct TempArchive {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl TempArchive {
    /// Reserve `<scratch_root>/s3manager-XXXX/<file_name>`. Nothing is written yet.
    pub fn new_in(scratch_root: &Path, file_name: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(ARCHIVE_SCRATCH_PREFIX)
            .tempdir_in(scratch_root)
            .map_err(|e| Error::ArchiveCreationFailed {
                path: scratch_root.join(file_name),
                reason: format!("cannot create scratch directory: {e}"),
            })?;
        let path = dir.path().join(file_name);
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let location = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("removed scratch archive {}", self.path.display()),
                Err(e) => warn!(
                    "failed to clean up temporary archive {}: {}",
                    location.display(),
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_timestamped(name: &str, prefix: &str, ext: &str) -> bool {
        let Some(rest) = name.strip_prefix(prefix).and_then(|r| r.strip_suffix(ext)) else {
            return false;
        };
        let digits: String = rest.chars().filter(|c| *c != '_').collect();
        rest.len() == 15 && rest.as_bytes()[8] == b'_' && digits.len() == 14
            && digits.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn single_source_uses_its_stem() {
        let name = generate_archive_name(&["x/report.pdf"], ".zip");
        assert!(is_timestamped(&name, "report_", ".zip"), "{name}");
    }

    #[test]
    fn several_sources_use_archive_prefix() {
        let name = generate_archive_name(&["a", "b"], ".zip");
        assert!(is_timestamped(&name, "archive_", ".zip"), "{name}");
    }

    #[test]
    fn extension_without_dot_is_accepted() {
        let name = generate_archive_name(&["data/"], "zip");
        assert!(is_timestamped(&name, "data_", ".zip"), "{name}");
    }

    #[test]
    fn custom_names_get_zip_suffix() {
        assert_eq!(custom_archive_name("v1.0.0"), "v1.0.0.zip");
        assert_eq!(custom_archive_name("release.ZIP"), "release.ZIP");
    }

    #[test]
    fn temp_archive_removes_its_directory() {
        let root = tempfile::TempDir::new().unwrap();
        let scratch_dir;
        {
            let tmp = TempArchive::new_in(root.path(), "a.zip").unwrap();
            scratch_dir = tmp.path().parent().unwrap().to_path_buf();
            fs::write(tmp.path(), b"partial").unwrap();
            assert!(scratch_dir.exists());
        }
        assert!(!scratch_dir.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
