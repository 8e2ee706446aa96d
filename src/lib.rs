// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: module tree plus the public re-exports the CLI and tests use.

// ===== Core Public API =====
pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{CallOptions, Client};
pub use config::StorageCredentials;
pub use error::{Error, Result};
pub use models::{
    ArchiveInfo, BucketInfo, DeleteResult, DownloadItem, DownloadResult, ErrorResponse, UploadItem,
    UploadResult,
};
pub use upload::UploadRequest;

// ===== Pipeline Modules =====
pub mod archive;
pub mod batch_delete;
pub mod download;
pub mod lister;
pub mod path_analyzer;
pub mod remote_path;
pub mod upload;

// ===== Storage Backends =====
pub mod memory_store;
pub mod multipart;
pub mod object_store;
pub mod s3_client;
pub mod s3_store;

pub use memory_store::MemoryObjectStore;
pub use object_store::{ListPage, ObjectEntry, ObjectStore};
pub use s3_store::S3ObjectStore;

// ===== Support =====
pub mod confirm;
pub mod constants;
pub mod format;
