// src/constants.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Centralized constants for s3manager to avoid hardcoded values throughout the codebase

/// Region used when neither the environment nor the configuration names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Maximum number of keys a single bulk-delete call accepts
pub const DELETE_BATCH_SIZE: usize = 1000;

/// Files at or above this size are uploaded with multipart (32 MB)
pub const DEFAULT_S3_MULTIPART_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Multipart upload part size (16 MB)
pub const DEFAULT_S3_MULTIPART_PART_SIZE: usize = 16 * 1024 * 1024;

/// Minimum S3 multipart upload part size (5 MB - AWS requirement)
pub const MIN_S3_MULTIPART_PART_SIZE: usize = 5 * 1024 * 1024;

/// Concurrent part uploads for a single multipart transfer
pub const DEFAULT_MULTIPART_CONCURRENCY: usize = 5;

/// Connect timeout for the S3 HTTP client (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Extension of archives built for upload
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Compact, sortable timestamp used in generated archive names
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Prefix of the scratch directory an archive is built in
pub const ARCHIVE_SCRATCH_PREFIX: &str = "s3manager-";

/// Per-command default timeouts used by the CLI (seconds)
pub const DEFAULT_BUCKET_INFO_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DELETE_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Largest age (days) the CLI accepts for `delete-old`
pub const MAX_DELETE_AGE_DAYS: u32 = 3_650_000;
