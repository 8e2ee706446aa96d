// src/s3_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! `ObjectStore` on top of the AWS SDK S3 client.

use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use chrono::{DateTime, TimeZone, Utc};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::StorageCredentials;
use crate::constants::DEFAULT_S3_MULTIPART_THRESHOLD;
use crate::multipart::{self, MultipartUploadConfig, OpenUploads};
use crate::object_store::{ListPage, ObjectEntry, ObjectStore};
use crate::s3_client::{build_client, sdk_err};

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    multipart_threshold: u64,
    multipart: MultipartUploadConfig,
    open_uploads: OpenUploads,
}

impl S3ObjectStore {
    pub async fn connect(creds: &StorageCredentials) -> Self {
        Self::from_client(build_client(creds).await)
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            multipart_threshold: DEFAULT_S3_MULTIPART_THRESHOLD,
            multipart: MultipartUploadConfig::default(),
            open_uploads: OpenUploads::default(),
        }
    }

    /// Files at or above `threshold` bytes go through multipart upload.
    pub fn with_multipart(mut self, threshold: u64, cfg: MultipartUploadConfig) -> Self {
        self.multipart_threshold = threshold;
        self.multipart = cfg;
        self
    }

    /// Multipart uploads started by this store that are still open.
    pub fn open_uploads(&self) -> &OpenUploads {
        &self.open_uploads
    }
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts.secs(), ts.subsec_nanos()).single()
}

fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage> {
        let mut req = self.client.list_objects_v2().bucket(bucket);
        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }
        if let Some(token) = continuation {
            req = req.continuation_token(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| sdk_err("ListObjectsV2 failed", e))?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectEntry {
                    key,
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        let next_token = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListPage { objects, next_token })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let objs: Vec<ObjectIdentifier> = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build().map_err(anyhow::Error::from))
            .collect::<Result<_>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objs))
            .quiet(true)
            .build()
            .map_err(anyhow::Error::from)?;

        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_err("DeleteObjects failed", e))?;

        let errors = resp.errors();
        if !errors.is_empty() {
            let detail: Vec<String> = errors
                .iter()
                .take(5)
                .map(|e| {
                    format!(
                        "{}: {} {}",
                        e.key().unwrap_or("?"),
                        e.code().unwrap_or("Unknown"),
                        e.message().unwrap_or("")
                    )
                })
                .collect();
            bail!(
                "{} of {} key(s) failed to delete: {}",
                errors.len(),
                keys.len(),
                detail.join("; ")
            );
        }
        Ok(())
    }

    async fn put_file(&self, bucket: &str, key: &str, local: &Path) -> Result<u64> {
        let size = tokio::fs::metadata(local)
            .await
            .with_context(|| format!("failed to stat {}", local.display()))?
            .len();
        let content_type = content_type_for(local);

        if size >= self.multipart_threshold {
            debug!("multipart upload of {} ({} bytes) to {}", local.display(), size, key);
            let cfg = MultipartUploadConfig {
                content_type: Some(content_type),
                ..self.multipart.clone()
            };
            return multipart::upload_file(&self.client, bucket, key, local, &cfg, &self.open_uploads).await;
        }

        let body = ByteStream::from_path(local)
            .await
            .with_context(|| format!("failed to read {}", local.display()))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_err("PutObject failed", e))?;
        Ok(size)
    }

    async fn get_to_file(&self, bucket: &str, key: &str, local: &Path) -> Result<u64> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_err("GetObject failed", e))?;

        let mut file = tokio::fs::File::create(local)
            .await
            .with_context(|| format!("failed to create {}", local.display()))?;
        let mut body = resp.body.into_async_read();
        let written = tokio::io::copy(&mut body, &mut file)
            .await
            .context("failed while streaming object body")?;
        file.flush().await?;
        Ok(written)
    }

    async fn bucket_region(&self, bucket: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_err("GetBucketLocation failed", e))?;
        Ok(resp
            .location_constraint()
            .map(|c| c.as_str().to_string())
            .filter(|r| !r.is_empty()))
    }

    async fn bucket_creation_date(&self, bucket: &str) -> Result<Option<DateTime<Utc>>> {
        let resp = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_err("ListBuckets failed", e))?;
        Ok(resp
            .buckets()
            .iter()
            .find(|b| b.name() == Some(bucket))
            .and_then(|b| b.creation_date())
            .and_then(to_chrono))
    }

    async fn abort_open_uploads(&self) -> Result<usize> {
        Ok(self.open_uploads.abort_all(&self.client).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_falls_back_to_octet_stream() {
        assert_eq!(content_type_for(Path::new("a/report.json")), "application/json");
        assert_eq!(content_type_for(Path::new("archive.zip")), "application/zip");
        assert_eq!(content_type_for(Path::new("blob.unknownext")), "application/octet-stream");
    }

    #[test]
    fn sdk_timestamps_convert_to_utc() {
        let ts = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        let dt = to_chrono(&ts).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }
}
