// src/models.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Result objects returned by the client operations. All serialize to the JSON the CLI prints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BucketInfo {
    pub bucket_name: String,
    pub region: String,
    pub creation_date: Option<DateTime<Utc>>,
    pub object_count: u64,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeleteResult {
    pub bucket_name: String,
    pub folder: String,
    pub days_old: u32,
    pub deleted_files: Vec<String>,
    pub deleted_count: usize,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub operation_time: DateTime<Utc>,
    pub cutoff_date: DateTime<Utc>,
    pub dry_run: bool,
}

/// One uploaded unit: an archive, or a single file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadItem {
    pub local_path: String,
    pub remote_path: String,
    pub size_bytes: u64,
    pub is_archived: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub bucket_name: String,
    pub destination_path: String,
    pub items: Vec<UploadItem>,
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub operation_time: DateTime<Utc>,
    pub archive_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    pub upload_duration: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadItem {
    pub remote_path: String,
    pub local_path: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub bucket_name: String,
    pub source_path: String,
    pub items: Vec<DownloadItem>,
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub operation_time: DateTime<Utc>,
    pub download_duration: String,
}

/// Outcome of building an upload archive. Lives only as long as the upload call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArchiveInfo {
    pub archive_path: PathBuf,
    pub original_paths: Vec<PathBuf>,
    pub compressed_size: u64,
    pub original_size: u64,
    pub compression_ratio: f64,
    pub entries: usize,
    pub created_at: DateTime<Utc>,
}

/// What the CLI prints when a command fails.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub timestamp: String,
    pub command: String,
}

impl ErrorResponse {
    pub fn new(error: &dyn std::fmt::Display, command: &str) -> Self {
        Self {
            error: error.to_string(),
            timestamp: crate::format::format_time(&Utc::now()),
            command: command.to_string(),
        }
    }
}
