// src/object_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Backend-neutral storage interface.
//!
//! Every bucket operation the client performs goes through [`ObjectStore`]. The S3
//! implementation lives in `s3_store`; `memory_store` keeps objects in process and is what
//! the tests run against.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    /// Absent when the service did not report a timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a prefix listing. `next_token` is `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectEntry>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of keys starting with `prefix`, in key order.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage>;

    /// Delete up to 1000 keys in one call. Any per-key failure fails the whole call.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    /// Upload the file at `local` to `key`. Returns the number of bytes sent.
    async fn put_file(&self, bucket: &str, key: &str, local: &Path) -> Result<u64>;

    /// Download `key` into `local`, creating or truncating it. Returns bytes written.
    /// On error `local` may hold partial data; callers download into a scratch file.
    async fn get_to_file(&self, bucket: &str, key: &str, local: &Path) -> Result<u64>;

    /// Region the bucket lives in, when the service reports one.
    async fn bucket_region(&self, bucket: &str) -> Result<Option<String>>;

    /// Creation date of the bucket, when the service reports one.
    async fn bucket_creation_date(&self, bucket: &str) -> Result<Option<DateTime<Utc>>>;

    /// Abort every upload this store started that has not finished, such as a multipart
    /// upload whose future was dropped. Returns how many were aborted.
    async fn abort_open_uploads(&self) -> Result<usize> {
        Ok(0)
    }
}
