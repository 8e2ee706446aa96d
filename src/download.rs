// src/download.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Fetch the most recently modified object under a folder.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::format::{format_bytes, format_elapsed};
use crate::lister::ObjectLister;
use crate::models::{DownloadItem, DownloadResult};
use crate::object_store::{ObjectEntry, ObjectStore};
use crate::remote_path::{key_base_name, listing_prefix};

/// Newest object by last-modified. On ties the earliest listed wins; objects without a
/// timestamp only win when no object has one.
pub fn select_latest(objects: &[ObjectEntry]) -> Option<&ObjectEntry> {
    let mut best: Option<&ObjectEntry> = None;
    for obj in objects {
        match best {
            None => best = Some(obj),
            Some(cur) if obj.last_modified > cur.last_modified => best = Some(obj),
            _ => {}
        }
    }
    best
}

pub struct DownloadSelector {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl DownloadSelector {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Download the newest object under `folder` into `destination_dir`, named after the
    /// key's last segment. The object is streamed into a scratch file in the same directory
    /// and moved over the target only once complete, so a failed transfer leaves any
    /// existing file of that name untouched.
    pub async fn download_latest(&self, folder: &str, destination_dir: &Path) -> Result<DownloadResult> {
        let started = Instant::now();
        let operation_time = Utc::now();
        let prefix = listing_prefix(folder);

        let listing = ObjectLister::new(self.store.clone(), self.bucket.clone(), prefix)
            .collect()
            .await?;
        let latest = select_latest(&listing.objects)
            .cloned()
            .ok_or_else(|| Error::NoObjectsFound(folder.to_string()))?;
        debug!(
            "latest of {} object(s) under '{}' is {}",
            listing.objects.len(),
            folder,
            latest.key
        );

        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(|source| Error::DirectoryCreationFailed {
                path: destination_dir.to_path_buf(),
                source,
            })?;

        let file_name = key_base_name(&latest.key).ok_or_else(|| Error::DownloadFailed {
            key: latest.key.clone(),
            reason: "key has no file name".to_string(),
        })?;
        let local = destination_dir.join(file_name);

        let failed = |reason: String| Error::DownloadFailed {
            key: latest.key.clone(),
            reason,
        };
        let scratch = tempfile::Builder::new()
            .prefix(".s3manager-")
            .suffix(".part")
            .tempfile_in(destination_dir)
            .map_err(|e| failed(format!("cannot create scratch file: {e}")))?;

        let written = self
            .store
            .get_to_file(&self.bucket, &latest.key, scratch.path())
            .await
            .map_err(|e| failed(format!("{e:#}")))?;
        scratch
            .persist(&local)
            .map_err(|e| failed(format!("cannot move download into place: {}", e.error)))?;

        info!("downloaded {} ({}) to {}", latest.key, format_bytes(written), local.display());
        let item = DownloadItem {
            remote_path: latest.key,
            local_path: local.display().to_string(),
            size_bytes: written,
            last_modified: latest.last_modified,
        };
        Ok(DownloadResult {
            bucket_name: self.bucket.clone(),
            source_path: folder.to_string(),
            total_files: 1,
            total_size_bytes: written,
            total_size_human: format_bytes(written),
            items: vec![item],
            operation_time,
            download_duration: format_elapsed(started.elapsed()),
        })
    }
}
