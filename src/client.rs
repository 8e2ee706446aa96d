// src/client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! The client facade: one set of credentials, one storage backend, four operations.
//!
//! Every operation runs under a deadline. When it expires the operation future is dropped,
//! which removes any scratch archive. Uploads the store still has open are then aborted
//! before the call fails with [`Error::Timeout`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::batch_delete::{BatchDeleter, DeletePlan, cutoff_for};
use crate::config::StorageCredentials;
use crate::constants::{
    DEFAULT_BUCKET_INFO_TIMEOUT_SECS, DEFAULT_DELETE_TIMEOUT_SECS, DEFAULT_DOWNLOAD_TIMEOUT_SECS,
    DEFAULT_UPLOAD_TIMEOUT_SECS,
};
use crate::download::DownloadSelector;
use crate::error::{Error, Result};
use crate::format::format_bytes;
use crate::lister::ObjectLister;
use crate::models::{BucketInfo, DeleteResult, DownloadResult, UploadResult};
use crate::object_store::ObjectStore;
use crate::remote_path::listing_prefix;
use crate::s3_store::S3ObjectStore;
use crate::upload::{UploadOrchestrator, UploadRequest};

/// Per-call overrides. Unset fields fall back to the configured bucket and the operation's
/// default timeout.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub bucket: Option<String>,
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub struct Client {
    credentials: StorageCredentials,
    store: Arc<dyn ObjectStore>,
    scratch_dir: PathBuf,
}

impl Client {
    /// Client backed by S3 (or an S3-compatible endpoint) as described by `credentials`.
    pub async fn connect(credentials: StorageCredentials) -> Self {
        let store = S3ObjectStore::connect(&credentials).await;
        Self::with_store(credentials, Arc::new(store))
    }

    /// Client backed by an arbitrary store.
    pub fn with_store(credentials: StorageCredentials, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            credentials,
            store,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Where upload archives are built. Defaults to the system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn credentials(&self) -> &StorageCredentials {
        &self.credentials
    }

    fn bucket_for(&self, opts: &CallOptions) -> Result<String> {
        match opts.bucket.as_deref() {
            Some(b) if b.trim().is_empty() => {
                Err(Error::ConfigurationInvalid("bucket override must not be empty".into()))
            }
            Some(b) => Ok(b.to_string()),
            None => Ok(self.credentials.bucket().to_string()),
        }
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, after: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(after, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!("{} timed out after {:?}", operation, after);
                self.abort_open_uploads().await;
                Err(Error::Timeout { operation, after })
            }
        }
    }

    /// Abort uploads left open by a dropped operation (timeout, Ctrl-C). Returns how many
    /// were aborted; failures are logged.
    pub async fn abort_open_uploads(&self) -> usize {
        match self.store.abort_open_uploads().await {
            Ok(0) => 0,
            Ok(n) => {
                info!("aborted {} open upload(s)", n);
                n
            }
            Err(e) => {
                warn!("failed to abort open uploads: {:#}", e);
                0
            }
        }
    }

    /// Object count, total size and newest timestamp across the whole bucket, plus region
    /// and creation date when the service reports them.
    pub async fn get_bucket_info(&self, opts: &CallOptions) -> Result<BucketInfo> {
        let bucket = self.bucket_for(opts)?;
        let after = opts
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_BUCKET_INFO_TIMEOUT_SECS));

        self.with_deadline("bucket info", after, async {
            let stats = ObjectLister::new(self.store.clone(), bucket.clone(), "")
                .summarize()
                .await?;

            let region = match self.store.bucket_region(&bucket).await {
                Ok(Some(r)) => r,
                Ok(None) => self.credentials.region().to_string(),
                Err(e) => {
                    warn!("could not read bucket location, using configured region: {:#}", e);
                    self.credentials.region().to_string()
                }
            };
            let creation_date = match self.store.bucket_creation_date(&bucket).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("could not read bucket creation date: {:#}", e);
                    None
                }
            };

            Ok(BucketInfo {
                bucket_name: bucket.clone(),
                region,
                creation_date,
                object_count: stats.count,
                total_size_bytes: stats.total_size,
                total_size_human: format_bytes(stats.total_size),
                last_modified: stats.last_modified,
                api_endpoint: self.credentials.endpoint().map(str::to_string),
            })
        })
        .await
    }

    /// Delete objects under `folder` last modified more than `days` days ago.
    ///
    /// With `dry_run` nothing is deleted; `deleted_files` still lists every candidate and
    /// `deleted_count` is 0.
    pub async fn delete_old_files(
        &self,
        days: u32,
        folder: &str,
        dry_run: bool,
        opts: &CallOptions,
    ) -> Result<DeleteResult> {
        let bucket = self.bucket_for(opts)?;
        let after = opts
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_DELETE_TIMEOUT_SECS));

        self.with_deadline("delete", after, async {
            let operation_time = Utc::now();
            let cutoff = cutoff_for(operation_time, days)?;
            let listing = ObjectLister::new(self.store.clone(), bucket.clone(), listing_prefix(folder))
                .collect()
                .await?;
            let plan = DeletePlan::from_listing(listing.objects, cutoff);
            debug!(
                "{} of {} object(s) under '{}' are older than {}",
                plan.len(),
                listing.stats.count,
                folder,
                cutoff
            );

            let deleted_count = if dry_run || plan.is_empty() {
                0
            } else {
                BatchDeleter::new(self.store.clone(), bucket.clone())
                    .execute(&plan)
                    .await?
            };
            if dry_run {
                info!("dry run: {} object(s) would be deleted", plan.len());
            }

            let total_size_bytes = plan.total_size();
            Ok(DeleteResult {
                bucket_name: bucket.clone(),
                folder: folder.to_string(),
                days_old: days,
                deleted_files: plan.keys(),
                deleted_count,
                total_size_bytes,
                total_size_human: format_bytes(total_size_bytes),
                operation_time,
                cutoff_date: cutoff,
                dry_run,
            })
        })
        .await
    }

    /// Upload the request's paths, archived into one zip or file by file.
    pub async fn upload_files(&self, req: &UploadRequest, opts: &CallOptions) -> Result<UploadResult> {
        let bucket = self.bucket_for(opts)?;
        let after = opts
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS));
        let orchestrator = UploadOrchestrator::new(self.store.clone(), bucket, self.scratch_dir.clone());
        self.with_deadline("upload", after, orchestrator.upload(req)).await
    }

    /// What [`upload_files`](Self::upload_files) would do, without touching the bucket.
    pub async fn preview_upload(&self, req: &UploadRequest, opts: &CallOptions) -> Result<UploadResult> {
        let bucket = self.bucket_for(opts)?;
        let orchestrator = UploadOrchestrator::new(self.store.clone(), bucket, self.scratch_dir.clone());
        orchestrator.preview(req)
    }

    /// Download the newest object under `folder` into `destination_dir`.
    pub async fn download_latest_file(
        &self,
        folder: &str,
        destination_dir: &Path,
        opts: &CallOptions,
    ) -> Result<DownloadResult> {
        let bucket = self.bucket_for(opts)?;
        let after = opts
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS));
        let selector = DownloadSelector::new(self.store.clone(), bucket);
        self.with_deadline("download", after, selector.download_latest(folder, destination_dir)).await
    }
}
