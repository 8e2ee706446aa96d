// tests/test_multipart.rs
//
// Multipart transfers against a live S3-compatible endpoint. Runs only when
// S3MANAGER_LIVE_TESTS is set and the usual storage variables point at a writable bucket.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, ensure};
use s3manager::multipart::MultipartUploadConfig;
use s3manager::s3_client::build_client;
use s3manager::{ObjectStore, S3ObjectStore, StorageCredentials};

fn live_credentials() -> Option<StorageCredentials> {
    std::env::var_os("S3MANAGER_LIVE_TESTS")?;
    dotenvy::dotenv().ok();
    StorageCredentials::from_env().ok()
}

fn unique(prefix: &str) -> String {
    let pid = std::process::id();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    format!("s3manager-{}-{}-{}", prefix, pid, now)
}

#[tokio::test]
async fn multipart_upload_stores_every_part() -> Result<()> {
    let Some(creds) = live_credentials() else {
        return Ok(());
    };
    let bucket = creds.bucket().to_string();
    let key = format!("{}.bin", unique("mpu"));

    // 8 parts of 5 MiB with at most 2 in flight.
    let part = 5 * 1024 * 1024;
    let file = tempfile::NamedTempFile::new()?;
    std::fs::write(file.path(), vec![0xABu8; 8 * part])?;
    let local_size = std::fs::metadata(file.path())?.len();

    let client = build_client(&creds).await;
    let cfg = MultipartUploadConfig {
        part_size: part,
        max_in_flight: 2,
        ..Default::default()
    };
    let store = S3ObjectStore::from_client(client.clone()).with_multipart(1, cfg);

    let sent = store.put_file(&bucket, &key, file.path()).await?;
    ensure!(sent == local_size, "sent {} of {} bytes", sent, local_size);
    ensure!(store.open_uploads().is_empty(), "upload still registered as open");

    let head = client
        .head_object()
        .bucket(&bucket)
        .key(&key)
        .send()
        .await
        .context("head_object")?;
    let size = head.content_length().unwrap_or_default();
    let _ = client.delete_object().bucket(&bucket).key(&key).send().await;
    ensure!(size == local_size as i64, "HEAD size mismatch: {} vs {}", size, local_size);
    Ok(())
}
