// src/batch_delete.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Age-based cleanup: pick objects older than a cutoff, then remove them in bulk-delete
//! batches of at most 1000 keys.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::constants::DELETE_BATCH_SIZE;
use crate::error::{Error, Result};
use crate::object_store::{ObjectEntry, ObjectStore};

/// `now - days`. Ages reaching past the earliest representable date are
/// [`Error::ConfigurationInvalid`].
pub fn cutoff_for(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or_else(|| Error::ConfigurationInvalid(format!("age of {days} days is out of range")))
}

/// Keys selected for deletion, in listing order. Built before anything is deleted.
#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub candidates: Vec<ObjectEntry>,
    pub cutoff: DateTime<Utc>,
}

impl DeletePlan {
    /// Objects last modified strictly before `cutoff`. Objects without a timestamp are never
    /// candidates.
    pub fn from_listing(objects: impl IntoIterator<Item = ObjectEntry>, cutoff: DateTime<Utc>) -> Self {
        let candidates = objects
            .into_iter()
            .filter(|o| o.last_modified.is_some_and(|ts| ts < cutoff))
            .collect();
        Self { candidates, cutoff }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn total_size(&self) -> u64 {
        self.candidates.iter().map(|o| o.size).sum()
    }

    pub fn keys(&self) -> Vec<String> {
        self.candidates.iter().map(|o| o.key.clone()).collect()
    }
}

pub struct BatchDeleter {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    batch_size: usize,
}

impl BatchDeleter {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            batch_size: DELETE_BATCH_SIZE,
        }
    }

    /// Clamped to `1..=1000`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, DELETE_BATCH_SIZE);
        self
    }

    /// Delete every planned key, one batch at a time. Returns the number of keys deleted.
    ///
    /// Batches are numbered from 1. When batch `n` fails, batches `1..n` stay deleted and
    /// their key count is reported in [`Error::BatchDeleteFailed`].
    pub async fn execute(&self, plan: &DeletePlan) -> Result<usize> {
        let keys = plan.keys();
        let mut deleted = 0usize;
        for (idx, chunk) in keys.chunks(self.batch_size).enumerate() {
            let batch = idx + 1;
            debug!(
                "deleting batch {} ({} keys) from bucket {}",
                batch,
                chunk.len(),
                self.bucket
            );
            self.store
                .delete_objects(&self.bucket, chunk)
                .await
                .map_err(|e| Error::BatchDeleteFailed {
                    batch,
                    deleted_before: deleted,
                    reason: format!("{e:#}"),
                })?;
            deleted += chunk.len();
        }
        info!("deleted {} object(s) from bucket {}", deleted, self.bucket);
        Ok(deleted)
    }
}
