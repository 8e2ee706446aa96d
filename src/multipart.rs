// src/multipart.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Concurrent multipart upload (MPU) of one local file.
//
// Design:
// - Parts are read from the file sequentially, one part-size buffer at a time.
// - A semaphore permit is taken *before* each read, so at most `max_in_flight` part
//   buffers exist at once and memory stays bounded by max_in_flight * part_size.
// - UploadPart calls run on a JoinSet; every (part, ETag) pair is kept, whether it was
//   drained early or at the end, and the list is sorted by part number for
//   CompleteMultipartUpload.
// - Every started MPU is recorded in `OpenUploads` until it completes or is aborted.
//   Failures abort inline. If the future is dropped mid-flight (timeout, Ctrl-C) the
//   drop guard spawns an abort, and the owner can also await `OpenUploads::abort_all`
//   so nothing is left open when the process exits right after.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_MULTIPART_CONCURRENCY, DEFAULT_S3_MULTIPART_PART_SIZE, MIN_S3_MULTIPART_PART_SIZE};
use crate::s3_client::sdk_err;

#[derive(Clone, Debug)]
pub struct MultipartUploadConfig {
    /// Size of each part in bytes (S3 minimum is 5 MiB except for the last part).
    pub part_size: usize,
    /// Maximum number of concurrent in-flight part uploads.
    pub max_in_flight: usize,
    /// Content-Type set on CreateMultipartUpload.
    pub content_type: Option<String>,
}

impl Default for MultipartUploadConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_S3_MULTIPART_PART_SIZE,
            max_in_flight: DEFAULT_MULTIPART_CONCURRENCY,
            content_type: None,
        }
    }
}

#[derive(Clone, Debug)]
struct OpenUpload {
    bucket: String,
    key: String,
}

/// Multipart uploads that were started and have not yet completed or been aborted.
///
/// Cloning shares the registry. An entry is claimed exactly once, either by the upload
/// itself (completion or inline abort) or by [`abort_all`](Self::abort_all).
#[derive(Clone, Debug, Default)]
pub struct OpenUploads {
    inner: Arc<Mutex<HashMap<String, OpenUpload>>>,
}

impl OpenUploads {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, OpenUpload>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, upload_id: &str, bucket: &str, key: &str) {
        self.lock().insert(
            upload_id.to_string(),
            OpenUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
        );
    }

    fn claim(&self, upload_id: &str) -> Option<OpenUpload> {
        self.lock().remove(upload_id)
    }

    fn claim_all(&self) -> Vec<(String, OpenUpload)> {
        self.lock().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Abort every upload still open. Returns how many were aborted.
    pub async fn abort_all(&self, client: &Client) -> usize {
        let open = self.claim_all();
        let count = open.len();
        for (upload_id, up) in open {
            abort(client, &upload_id, &up).await;
        }
        count
    }
}

async fn abort(client: &Client, upload_id: &str, up: &OpenUpload) {
    match client
        .abort_multipart_upload()
        .bucket(&up.bucket)
        .key(&up.key)
        .upload_id(upload_id)
        .send()
        .await
    {
        Ok(_) => debug!("aborted multipart upload {} for {}", upload_id, up.key),
        Err(e) => warn!(
            "failed to abort multipart upload {} for {}: {}",
            upload_id,
            up.key,
            sdk_err("AbortMultipartUpload", e)
        ),
    }
}

/// Aborts the upload on drop unless disarmed.
struct AbortGuard {
    client: Client,
    upload_id: String,
    open: OpenUploads,
    armed: bool,
}

impl AbortGuard {
    async fn abort_now(mut self) {
        self.armed = false;
        if let Some(up) = self.open.claim(&self.upload_id) {
            abort(&self.client, &self.upload_id, &up).await;
        }
    }

    fn disarm(mut self) {
        self.armed = false;
        self.open.claim(&self.upload_id);
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Can't .await in Drop; fire-and-forget on the current runtime. The entry stays in
        // `OpenUploads` until claimed, so an owner awaiting `abort_all` still covers it.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("multipart upload {} left open: no runtime to abort it", self.upload_id);
            return;
        };
        let client = self.client.clone();
        let open = self.open.clone();
        let upload_id = std::mem::take(&mut self.upload_id);
        handle.spawn(async move {
            if let Some(up) = open.claim(&upload_id) {
                abort(&client, &upload_id, &up).await;
            }
        });
    }
}

/// Sends one part and returns its ETag.
#[async_trait]
pub(crate) trait PartUploader: Send + Sync + 'static {
    async fn upload_part(&self, part_number: i32, body: Vec<u8>) -> Result<String>;
}

struct S3PartUploader {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
}

#[async_trait]
impl PartUploader for S3PartUploader {
    async fn upload_part(&self, part_number: i32, body: Vec<u8>) -> Result<String> {
        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_err("UploadPart failed", e))?;
        let etag = resp.e_tag().unwrap_or_default().to_string();
        if etag.is_empty() {
            bail!("UploadPart returned empty ETag for part {part_number}");
        }
        Ok(etag)
    }
}

/// Upload `path` to `bucket/key` with multipart. Returns the number of bytes sent.
pub async fn upload_file(
    client: &Client,
    bucket: &str,
    key: &str,
    path: &Path,
    cfg: &MultipartUploadConfig,
    open: &OpenUploads,
) -> Result<u64> {
    if cfg.part_size < MIN_S3_MULTIPART_PART_SIZE {
        bail!("part_size must be at least 5 MiB for S3 Multipart Upload");
    }
    if cfg.max_in_flight == 0 {
        bail!("max_in_flight must be >= 1");
    }

    let mut req = client.create_multipart_upload().bucket(bucket).key(key);
    if let Some(ct) = &cfg.content_type {
        req = req.content_type(ct);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| sdk_err("CreateMultipartUpload failed", e))?;
    let upload_id = resp.upload_id().unwrap_or_default().to_string();
    if upload_id.is_empty() {
        bail!("CreateMultipartUpload returned empty upload_id");
    }
    debug!("started multipart upload {} for {}", upload_id, key);

    open.register(&upload_id, bucket, key);
    let guard = AbortGuard {
        client: client.clone(),
        upload_id: upload_id.clone(),
        open: open.clone(),
        armed: true,
    };

    let uploader = Arc::new(S3PartUploader {
        client: client.clone(),
        bucket: bucket.to_string(),
        key: key.to_string(),
        upload_id: upload_id.clone(),
    });
    let (parts, total_bytes) = match upload_parts(uploader, path, cfg).await {
        Ok(done) => done,
        Err(e) => {
            guard.abort_now().await;
            return Err(e);
        }
    };

    let part_count = parts.len();
    let completed: Vec<CompletedPart> = parts
        .into_iter()
        .map(|(pn, etag)| {
            CompletedPart::builder()
                .set_e_tag(Some(etag))
                .set_part_number(Some(pn))
                .build()
        })
        .collect();
    let cmu = CompletedMultipartUpload::builder()
        .set_parts(Some(completed))
        .build();
    if let Err(e) = client
        .complete_multipart_upload()
        .bucket(bucket)
        .key(key)
        .upload_id(&upload_id)
        .multipart_upload(cmu)
        .send()
        .await
    {
        guard.abort_now().await;
        return Err(sdk_err("CompleteMultipartUpload failed", e));
    }

    guard.disarm();
    debug!(
        "completed multipart upload {}: {} part(s), {} bytes",
        upload_id, part_count, total_bytes
    );
    Ok(total_bytes)
}

/// Read `path` part by part and send each through `uploader`. Returns every
/// `(part_number, etag)` sorted by part number, plus the bytes read.
pub(crate) async fn upload_parts<U: PartUploader>(
    uploader: Arc<U>,
    path: &Path,
    cfg: &MultipartUploadConfig,
) -> Result<(Vec<(i32, String)>, u64)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    let sem = Arc::new(Semaphore::new(cfg.max_in_flight.max(1)));
    let mut tasks: JoinSet<Result<(i32, String)>> = JoinSet::new();
    let mut done: Vec<(i32, String)> = Vec::new();
    let mut total_bytes = 0u64;
    let mut part_number: i32 = 1;

    loop {
        // Collect finished parts as we go; a failed one stops reading the rest of the file.
        while let Some(joined) = tasks.try_join_next() {
            done.push(joined.context("part task join failed")??);
        }

        let permit = sem.clone().acquire_owned().await.context("semaphore closed")?;
        let mut buf = Vec::with_capacity(cfg.part_size);
        let n = (&mut file)
            .take(cfg.part_size as u64)
            .read_to_end(&mut buf)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        total_bytes += n as u64;

        let uploader = uploader.clone();
        let pn = part_number;
        tasks.spawn(async move {
            let _permit = permit;
            let etag = uploader.upload_part(pn, buf).await?;
            Ok((pn, etag))
        });
        part_number += 1;
    }

    while let Some(joined) = tasks.join_next().await {
        done.push(joined.context("part task join failed")??);
    }
    done.sort_by_key(|(pn, _)| *pn);

    let expected = (part_number - 1) as usize;
    if done.len() != expected {
        bail!("collected {} of {} part(s)", done.len(), expected);
    }
    Ok((done, total_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Records every part it receives. Early parts finish immediately and later ones
    /// take a little longer, so both collection points in `upload_parts` get used.
    #[derive(Default)]
    struct RecordingUploader {
        parts: Mutex<Vec<(i32, usize)>>,
        fail_part: Option<i32>,
    }

    #[async_trait]
    impl PartUploader for RecordingUploader {
        async fn upload_part(&self, part_number: i32, body: Vec<u8>) -> Result<String> {
            if part_number > 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if self.fail_part == Some(part_number) {
                bail!("part {part_number} rejected");
            }
            self.parts.lock().unwrap().push((part_number, body.len()));
            Ok(format!("etag-{part_number}"))
        }
    }

    fn file_of(len: usize) -> NamedTempFile {
        let f = NamedTempFile::new().unwrap();
        std::fs::write(f.path(), vec![0xABu8; len]).unwrap();
        f
    }

    fn cfg(part_size: usize, max_in_flight: usize) -> MultipartUploadConfig {
        MultipartUploadConfig {
            part_size,
            max_in_flight,
            content_type: None,
        }
    }

    #[tokio::test]
    async fn every_part_is_completed_when_parts_exceed_in_flight_limit() {
        // 10 full parts plus a 3-byte tail, at most 2 in flight.
        let file = file_of(10 * 8 + 3);
        let uploader = Arc::new(RecordingUploader::default());

        let (parts, total) = upload_parts(uploader.clone(), file.path(), &cfg(8, 2))
            .await
            .unwrap();

        assert_eq!(total, 83);
        let numbers: Vec<i32> = parts.iter().map(|(pn, _)| *pn).collect();
        assert_eq!(numbers, (1..=11).collect::<Vec<_>>());
        assert!(parts.iter().all(|(pn, etag)| *etag == format!("etag-{pn}")));

        let mut sent = uploader.parts.lock().unwrap().clone();
        sent.sort();
        let bytes: usize = sent.iter().map(|(_, len)| len).sum();
        assert_eq!(bytes, 83);
        assert_eq!(sent.last(), Some(&(11, 3)));
    }

    #[tokio::test]
    async fn single_in_flight_slot_still_keeps_all_parts() {
        let file = file_of(5 * 4);
        let uploader = Arc::new(RecordingUploader::default());
        let (parts, total) = upload_parts(uploader, file.path(), &cfg(4, 1)).await.unwrap();
        assert_eq!(total, 20);
        assert_eq!(parts.len(), 5);
    }

    #[tokio::test]
    async fn failed_part_fails_the_upload() {
        let file = file_of(6 * 4);
        let uploader = Arc::new(RecordingUploader {
            fail_part: Some(3),
            ..Default::default()
        });
        let err = upload_parts(uploader, file.path(), &cfg(4, 2)).await.unwrap_err();
        assert!(format!("{err:#}").contains("part 3 rejected"), "{err:#}");
    }

    #[tokio::test]
    async fn empty_file_has_no_parts() {
        let file = file_of(0);
        let uploader = Arc::new(RecordingUploader::default());
        let (parts, total) = upload_parts(uploader, file.path(), &cfg(4, 2)).await.unwrap();
        assert!(parts.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn open_uploads_are_claimed_once() {
        let open = OpenUploads::default();
        open.register("u1", "bkt", "a.zip");
        open.register("u2", "bkt", "b.zip");
        assert_eq!(open.len(), 2);

        let shared = open.clone();
        assert_eq!(shared.claim("u1").map(|u| u.key), Some("a.zip".to_string()));
        assert!(open.claim("u1").is_none());

        let rest = open.claim_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].0, "u2");
        assert!(shared.is_empty());
    }
}
