// src/lister.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Paginated prefix listing with running totals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::object_store::{ObjectEntry, ObjectStore};

/// Aggregate view of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingStats {
    pub count: u64,
    pub total_size: u64,
    /// Newest timestamp seen; objects without one are ignored.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ListingStats {
    fn record(&mut self, obj: &ObjectEntry) {
        self.count += 1;
        self.total_size += obj.size;
        if let Some(ts) = obj.last_modified {
            if self.last_modified.is_none_or(|cur| ts > cur) {
                self.last_modified = Some(ts);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub objects: Vec<ObjectEntry>,
    pub stats: ListingStats,
}

/// Walks every page under one prefix. Single use: once exhausted it yields nothing more.
pub struct ObjectLister {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    token: Option<String>,
    done: bool,
    pages: usize,
}

impl ObjectLister {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
            token: None,
            done: false,
            pages: 0,
        }
    }

    /// Next page of objects, or `None` once the listing is complete.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ObjectEntry>>> {
        if self.done {
            return Ok(None);
        }
        let page = self
            .store
            .list_page(&self.bucket, &self.prefix, self.token.as_deref())
            .await
            .map_err(|e| Error::ListingFailed {
                prefix: self.prefix.clone(),
                reason: format!("{e:#}"),
            })?;
        self.pages += 1;
        self.token = page.next_token;
        self.done = self.token.is_none();
        debug!(
            "listed page {} of s3://{}/{}: {} object(s)",
            self.pages,
            self.bucket,
            self.prefix,
            page.objects.len()
        );
        Ok(Some(page.objects))
    }

    /// Drain every page, keeping the objects.
    pub async fn collect(mut self) -> Result<Listing> {
        let mut listing = Listing::default();
        while let Some(page) = self.next_page().await? {
            for obj in &page {
                listing.stats.record(obj);
            }
            listing.objects.extend(page);
        }
        Ok(listing)
    }

    /// Drain every page, keeping only the totals.
    pub async fn summarize(mut self) -> Result<ListingStats> {
        let mut stats = ListingStats::default();
        while let Some(page) = self.next_page().await? {
            page.iter().for_each(|o| stats.record(o));
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryObjectStore;
    use chrono::TimeZone;

    #[tokio::test]
    async fn totals_span_every_page() {
        let store = Arc::new(MemoryObjectStore::new().with_page_size(3));
        let newest = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        for i in 0..10u32 {
            let ts = Utc.with_ymd_and_hms(2025, 5, 1 + i, 0, 0, 0).unwrap();
            store.insert("bkt", &format!("k{i:02}"), vec![0u8; 10], Some(ts));
        }
        store.insert("bkt", "k99", vec![0u8; 5], Some(newest));
        store.insert("bkt", "k98", vec![0u8; 5], None);

        let listing = ObjectLister::new(store.clone(), "bkt", "").collect().await.unwrap();
        assert_eq!(listing.objects.len(), 12);
        assert_eq!(listing.stats.count, 12);
        assert_eq!(listing.stats.total_size, 110);
        assert_eq!(listing.stats.last_modified, Some(newest));
        assert_eq!(store.pages_served(), 4);
    }

    #[tokio::test]
    async fn failure_on_later_page_is_listing_failed() {
        let store = Arc::new(MemoryObjectStore::new().with_page_size(1));
        store.insert("bkt", "a", b"x".to_vec(), None);
        store.insert("bkt", "b", b"x".to_vec(), None);
        store.fail_listing_after(1);

        let err = ObjectLister::new(store, "bkt", "").summarize().await.unwrap_err();
        assert!(matches!(err, Error::ListingFailed { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn empty_prefix_yields_one_empty_page() {
        let store = Arc::new(MemoryObjectStore::new());
        store.create_bucket("bkt", None, None);
        let mut lister = ObjectLister::new(store, "bkt", "nothing/");
        assert_eq!(lister.next_page().await.unwrap(), Some(vec![]));
        assert_eq!(lister.next_page().await.unwrap(), None);
    }
}
