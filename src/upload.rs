// src/upload.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Upload local paths, either bundled into one zip archive or file by file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::archive::{self, TempArchive};
use crate::constants::ARCHIVE_EXTENSION;
use crate::error::{Error, Result};
use crate::format::{format_bytes, format_elapsed};
use crate::models::{UploadItem, UploadResult};
use crate::object_store::ObjectStore;
use crate::path_analyzer::{self, ExcludeSet};
use crate::remote_path::{join_components, resolve};

/// What to upload and how.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub paths: Vec<PathBuf>,
    /// Remote folder; empty means the bucket root.
    pub destination: String,
    pub archive: bool,
    /// Overrides the generated archive name. Ignored when `archive` is false.
    pub archive_name: Option<String>,
    /// Base-name globs left out of the archive. Ignored when `archive` is false.
    pub exclude: Vec<String>,
}

impl UploadRequest {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            archive: true,
            ..Default::default()
        }
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    pub fn archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    pub fn exclude<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    fn archive_file_name(&self) -> String {
        match &self.archive_name {
            Some(name) => archive::custom_archive_name(name),
            None => archive::generate_archive_name(&self.paths, ARCHIVE_EXTENSION),
        }
    }

    fn joined_local_paths(&self) -> String {
        self.paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One local file bound for one remote key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpload {
    pub local: PathBuf,
    pub key: String,
    pub size: u64,
}

/// Expand `paths` into per-file uploads, in input order then walk order.
pub fn plan_individual(paths: &[PathBuf], destination: &str) -> Result<Vec<PlannedUpload>> {
    path_analyzer::validate_paths(paths)?;
    let mut planned = Vec::new();
    for path in paths {
        let top = path_analyzer::source_name(path);
        for entry in path_analyzer::walk(path) {
            let entry = entry?;
            if entry.is_dir {
                continue;
            }
            let relative = if entry.depth == 0 {
                top.clone()
            } else {
                let rest = path_analyzer::relative_components(path, &entry.path);
                join_components(std::iter::once(top.as_str()).chain(rest.iter().map(String::as_str)))
            };
            planned.push(PlannedUpload {
                key: resolve(destination, &relative),
                local: entry.path,
                size: entry.size,
            });
        }
    }
    Ok(planned)
}

pub struct UploadOrchestrator {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    scratch_dir: PathBuf,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub async fn upload(&self, req: &UploadRequest) -> Result<UploadResult> {
        let started = Instant::now();
        let operation_time = Utc::now();
        path_analyzer::validate_paths(&req.paths)?;

        let (items, archive_path) = if req.archive {
            let (item, path) = self.upload_archive(req).await?;
            (vec![item], Some(path))
        } else {
            (self.upload_individual(req).await?, None)
        };

        let total_size_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();
        info!(
            "uploaded {} item(s), {} to bucket {}",
            items.len(),
            format_bytes(total_size_bytes),
            self.bucket
        );
        Ok(UploadResult {
            bucket_name: self.bucket.clone(),
            destination_path: req.destination.clone(),
            total_files: items.len(),
            items,
            total_size_bytes,
            total_size_human: format_bytes(total_size_bytes),
            operation_time,
            archive_created: req.archive,
            archive_path,
            upload_duration: format_elapsed(started.elapsed()),
            dry_run: false,
        })
    }

    /// The result `upload` would produce, without building or sending anything.
    ///
    /// An archive item reports the uncompressed size of what would be archived.
    pub fn preview(&self, req: &UploadRequest) -> Result<UploadResult> {
        let started = Instant::now();
        let operation_time = Utc::now();
        path_analyzer::validate_paths(&req.paths)?;

        let items = if req.archive {
            let exclude = ExcludeSet::new(&req.exclude)
                .map_err(|e| Error::ConfigurationInvalid(format!("invalid exclude pattern: {e}")))?;
            let mut size = 0u64;
            for path in &req.paths {
                for entry in path_analyzer::walk_excluding(path, &exclude) {
                    size += entry?.size;
                }
            }
            vec![UploadItem {
                local_path: req.joined_local_paths(),
                remote_path: resolve(&req.destination, &req.archive_file_name()),
                size_bytes: size,
                is_archived: true,
            }]
        } else {
            plan_individual(&req.paths, &req.destination)?
                .into_iter()
                .map(|p| UploadItem {
                    local_path: p.local.display().to_string(),
                    remote_path: p.key,
                    size_bytes: p.size,
                    is_archived: false,
                })
                .collect()
        };

        let total_size_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();
        Ok(UploadResult {
            bucket_name: self.bucket.clone(),
            destination_path: req.destination.clone(),
            total_files: items.len(),
            items,
            total_size_bytes,
            total_size_human: format_bytes(total_size_bytes),
            operation_time,
            archive_created: req.archive,
            archive_path: None,
            upload_duration: format_elapsed(started.elapsed()),
            dry_run: true,
        })
    }

    async fn upload_archive(&self, req: &UploadRequest) -> Result<(UploadItem, String)> {
        let name = req.archive_file_name();
        let scratch = TempArchive::new_in(&self.scratch_dir, &name)?;

        let sources = req.paths.clone();
        let exclude = req.exclude.clone();
        let output = scratch.path().to_path_buf();
        let info = tokio::task::spawn_blocking(move || archive::create_archive(&sources, &output, &exclude))
            .await
            .map_err(|e| Error::ArchiveCreationFailed {
                path: scratch.path().to_path_buf(),
                reason: format!("archive task failed: {e}"),
            })??;

        let key = resolve(&req.destination, &name);
        debug!("uploading archive {} to {}", scratch.path().display(), key);
        self.put(scratch.path(), &key).await?;

        let item = UploadItem {
            local_path: req.joined_local_paths(),
            remote_path: key,
            size_bytes: info.compressed_size,
            is_archived: true,
        };
        Ok((item, info.archive_path.display().to_string()))
        // `scratch` drops here and removes the archive
    }

    async fn upload_individual(&self, req: &UploadRequest) -> Result<Vec<UploadItem>> {
        let planned = plan_individual(&req.paths, &req.destination)?;
        let mut items = Vec::with_capacity(planned.len());
        for p in planned {
            let sent = self.put(&p.local, &p.key).await?;
            items.push(UploadItem {
                local_path: p.local.display().to_string(),
                remote_path: p.key,
                size_bytes: sent,
                is_archived: false,
            });
        }
        Ok(items)
    }

    async fn put(&self, local: &Path, key: &str) -> Result<u64> {
        let sent = self
            .store
            .put_file(&self.bucket, key, local)
            .await
            .map_err(|e| Error::UploadFailed {
                path: local.to_path_buf(),
                key: key.to_string(),
                reason: format!("{e:#}"),
            })?;
        debug!("uploaded {} ({} bytes) to {}", local.display(), sent, key);
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn plan_keeps_directory_name_and_order() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("project");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::write(project.join("src/main.rs"), b"fn main() {}").unwrap();
        let single = dir.path().join("notes.txt");
        fs::write(&single, b"hi").unwrap();

        let plan = plan_individual(&[single.clone(), project.clone()], "backups/").unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].key, "backups/notes.txt");
        assert_eq!(plan[0].size, 2);
        assert_eq!(plan[1].key, "backups/project/src/main.rs");
        assert_eq!(plan[1].local, project.join("src/main.rs"));
    }

    #[test]
    fn plan_rejects_missing_paths() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        assert!(matches!(
            plan_individual(&[missing], ""),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn archive_name_prefers_custom() {
        let req = UploadRequest::new(["a", "b"]).archive_name("release-1");
        assert_eq!(req.archive_file_name(), "release-1.zip");
        assert_eq!(req.joined_local_paths(), "a, b");
    }
}
