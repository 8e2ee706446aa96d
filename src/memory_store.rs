// src/memory_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! In-process `ObjectStore` used by the test-suite and for dry local experiments.
//!
//! Buckets and objects live in ordered maps, so listings come back in key order and
//! paginate with the same continuation contract as S3: the token is the last key of the
//! previous page. Faults and latency can be injected to exercise the client's error paths.
//! An upload counts as open from the moment it starts until it stores the object or fails,
//! so a dropped upload stays open until [`ObjectStore::abort_open_uploads`] is called.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::trace;

use crate::constants::DELETE_BATCH_SIZE;
use crate::object_store::{ListPage, ObjectEntry, ObjectStore};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Bucket {
    objects: BTreeMap<String, StoredObject>,
    region: Option<String>,
    created: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Pages served successfully before listings start failing.
    listing_after: Option<usize>,
    /// Batches deleted successfully before deletes start failing.
    delete_after: Option<usize>,
    /// Uploads whose key ends with this suffix fail.
    put_key_suffix: Option<String>,
    /// Downloads write half the object and then fail.
    get: bool,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, Bucket>,
    faults: Faults,
    pages_served: usize,
    delete_batches: Vec<usize>,
    next_upload: u64,
    open_uploads: BTreeMap<u64, String>,
    aborted_uploads: Vec<String>,
}

#[derive(Debug)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
    page_size: usize,
    latency: Option<Duration>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
        }
    }

    /// Maximum keys per listing page (at least 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleep this long before serving every request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("memory store state poisoned"))
    }

    async fn simulate_latency(&self) {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
    }

    // ---------------------------------------------------------------------
    // Fixture setup
    // ---------------------------------------------------------------------

    pub fn create_bucket(&self, bucket: &str, region: Option<&str>, created: Option<DateTime<Utc>>) {
        if let Ok(mut st) = self.state() {
            let b = st.buckets.entry(bucket.to_string()).or_default();
            b.region = region.map(str::to_string);
            b.created = created;
        }
    }

    /// Store an object directly, creating the bucket if needed.
    pub fn insert(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Vec<u8>>,
        last_modified: Option<DateTime<Utc>>,
    ) {
        if let Ok(mut st) = self.state() {
            st.buckets.entry(bucket.to_string()).or_default().objects.insert(
                key.to_string(),
                StoredObject {
                    data: data.into(),
                    last_modified,
                },
            );
        }
    }

    #[doc(hidden)]
    pub fn fail_listing_after(&self, pages: usize) {
        if let Ok(mut st) = self.state() {
            st.faults.listing_after = Some(pages);
        }
    }

    #[doc(hidden)]
    pub fn fail_delete_after(&self, batches: usize) {
        if let Ok(mut st) = self.state() {
            st.faults.delete_after = Some(batches);
        }
    }

    #[doc(hidden)]
    pub fn fail_put_for_suffix(&self, suffix: &str) {
        if let Ok(mut st) = self.state() {
            st.faults.put_key_suffix = Some(suffix.to_string());
        }
    }

    #[doc(hidden)]
    pub fn fail_downloads(&self) {
        if let Ok(mut st) = self.state() {
            st.faults.get = true;
        }
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    /// Keys of uploads started but neither finished nor aborted.
    pub fn open_uploads(&self) -> Vec<String> {
        self.state()
            .map(|st| st.open_uploads.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Keys of uploads removed by `abort_open_uploads`, in abort order.
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.state()
            .map(|st| st.aborted_uploads.clone())
            .unwrap_or_default()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .ok()
            .and_then(|st| st.buckets.get(bucket).map(|b| b.objects.keys().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let st = self.state().ok()?;
        st.buckets.get(bucket)?.objects.get(key).map(|o| o.data.clone())
    }

    /// Sizes of the delete batches served successfully, in call order.
    pub fn delete_batches(&self) -> Vec<usize> {
        self.state()
            .map(|st| st.delete_batches.clone())
            .unwrap_or_default()
    }

    pub fn pages_served(&self) -> usize {
        self.state().map(|st| st.pages_served).unwrap_or_default()
    }

    fn begin_upload(&self, key: &str) -> Result<u64> {
        let mut st = self.state()?;
        st.next_upload += 1;
        let id = st.next_upload;
        st.open_uploads.insert(id, key.to_string());
        Ok(id)
    }

    fn end_upload(&self, id: u64) {
        if let Ok(mut st) = self.state() {
            st.open_uploads.remove(&id);
        }
    }

    async fn store_file(&self, bucket: &str, key: &str, local: &Path) -> Result<u64> {
        self.simulate_latency().await;
        let data = tokio::fs::read(local)
            .await
            .with_context(|| format!("failed to read {}", local.display()))?;
        let len = data.len() as u64;

        let mut st = self.state()?;
        if let Some(suffix) = &st.faults.put_key_suffix {
            if key.ends_with(suffix.as_str()) {
                bail!("injected upload failure for {key}");
            }
        }
        let b = st
            .buckets
            .get_mut(bucket)
            .with_context(|| format!("NoSuchBucket: {bucket}"))?;
        b.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Some(Utc::now()),
            },
        );
        Ok(len)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage> {
        self.simulate_latency().await;
        let mut st = self.state()?;
        if let Some(limit) = st.faults.listing_after {
            if st.pages_served >= limit {
                bail!("injected listing failure after {} page(s)", limit);
            }
        }
        let b = st
            .buckets
            .get(bucket)
            .with_context(|| format!("NoSuchBucket: {bucket}"))?;

        let start = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let mut matched: Vec<ObjectEntry> = b
            .objects
            .range((start, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(self.page_size + 1)
            .map(|(k, o)| ObjectEntry {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: o.last_modified,
            })
            .collect();

        let next_token = if matched.len() > self.page_size {
            matched.truncate(self.page_size);
            matched.last().map(|o| o.key.clone())
        } else {
            None
        };
        st.pages_served += 1;
        trace!(
            "memory list {}/{}: {} object(s), more={}",
            bucket,
            prefix,
            matched.len(),
            next_token.is_some()
        );
        Ok(ListPage {
            objects: matched,
            next_token,
        })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        self.simulate_latency().await;
        if keys.len() > DELETE_BATCH_SIZE {
            bail!("MalformedXML: {} keys exceeds the {} key limit", keys.len(), DELETE_BATCH_SIZE);
        }
        let mut st = self.state()?;
        if let Some(limit) = st.faults.delete_after {
            if st.delete_batches.len() >= limit {
                bail!("injected delete failure after {} batch(es)", limit);
            }
        }
        let b = st
            .buckets
            .get_mut(bucket)
            .with_context(|| format!("NoSuchBucket: {bucket}"))?;
        for key in keys {
            b.objects.remove(key);
        }
        st.delete_batches.push(keys.len());
        Ok(())
    }

    async fn put_file(&self, bucket: &str, key: &str, local: &Path) -> Result<u64> {
        let id = self.begin_upload(key)?;
        let res = self.store_file(bucket, key, local).await;
        self.end_upload(id);
        res
    }

    async fn get_to_file(&self, bucket: &str, key: &str, local: &Path) -> Result<u64> {
        self.simulate_latency().await;
        let (data, fail) = {
            let st = self.state()?;
            let obj = st
                .buckets
                .get(bucket)
                .with_context(|| format!("NoSuchBucket: {bucket}"))?
                .objects
                .get(key)
                .with_context(|| format!("NoSuchKey: {key}"))?;
            (obj.data.clone(), st.faults.get)
        };
        if fail {
            tokio::fs::write(local, &data[..data.len() / 2]).await?;
            bail!("injected download failure for {key}");
        }
        tokio::fs::write(local, &data)
            .await
            .with_context(|| format!("failed to write {}", local.display()))?;
        Ok(data.len() as u64)
    }

    async fn bucket_region(&self, bucket: &str) -> Result<Option<String>> {
        self.simulate_latency().await;
        let st = self.state()?;
        let b = st
            .buckets
            .get(bucket)
            .with_context(|| format!("NoSuchBucket: {bucket}"))?;
        Ok(b.region.clone())
    }

    async fn bucket_creation_date(&self, bucket: &str) -> Result<Option<DateTime<Utc>>> {
        self.simulate_latency().await;
        let st = self.state()?;
        Ok(st.buckets.get(bucket).and_then(|b| b.created))
    }

    async fn abort_open_uploads(&self) -> Result<usize> {
        let mut st = self.state()?;
        let open = std::mem::take(&mut st.open_uploads);
        let count = open.len();
        st.aborted_uploads.extend(open.into_values());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_follow_continuation_tokens() {
        let store = MemoryObjectStore::new().with_page_size(2);
        for k in ["logs/a", "logs/b", "logs/c", "other/x", "logsx"] {
            store.insert("bkt", k, b"1".to_vec(), None);
        }

        let p1 = store.list_page("bkt", "logs/", None).await.unwrap();
        assert_eq!(p1.objects.len(), 2);
        let token = p1.next_token.clone().unwrap();
        let p2 = store.list_page("bkt", "logs/", Some(&token)).await.unwrap();
        assert_eq!(p2.objects.len(), 1);
        assert_eq!(p2.objects[0].key, "logs/c");
        assert!(p2.next_token.is_none());
    }

    #[tokio::test]
    async fn missing_bucket_is_an_error() {
        let store = MemoryObjectStore::new();
        assert!(store.list_page("nope", "", None).await.is_err());
    }

    #[tokio::test]
    async fn dropped_upload_stays_open_until_aborted() {
        let store = MemoryObjectStore::new().with_latency(Duration::from_millis(200));
        store.create_bucket("bkt", None, None);
        let file = tempfile::NamedTempFile::new().unwrap();

        let put = store.put_file("bkt", "slow.bin", file.path());
        assert!(tokio::time::timeout(Duration::from_millis(10), put).await.is_err());
        assert_eq!(store.open_uploads(), vec!["slow.bin".to_string()]);

        assert_eq!(store.abort_open_uploads().await.unwrap(), 1);
        assert!(store.open_uploads().is_empty());
        assert_eq!(store.aborted_uploads(), vec!["slow.bin".to_string()]);
        assert!(store.keys("bkt").is_empty());
    }

    #[tokio::test]
    async fn finished_upload_is_not_open() {
        let store = MemoryObjectStore::new();
        store.create_bucket("bkt", None, None);
        let file = tempfile::NamedTempFile::new().unwrap();
        store.put_file("bkt", "a", file.path()).await.unwrap();
        assert!(store.open_uploads().is_empty());
        assert_eq!(store.abort_open_uploads().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_rejects_oversized_batches() {
        let store = MemoryObjectStore::new();
        store.create_bucket("bkt", None, None);
        let keys: Vec<String> = (0..1001).map(|i| format!("k{i}")).collect();
        assert!(store.delete_objects("bkt", &keys).await.is_err());
        assert!(store.delete_batches().is_empty());
    }
}
