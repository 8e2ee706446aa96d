// src/error.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Error taxonomy shared by every core operation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("cannot access path {}: {source}", path.display())]
    PathInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create archive {}: {reason}", path.display())]
    ArchiveCreationFailed { path: PathBuf, reason: String },

    #[error("failed to list objects under '{prefix}': {reason}")]
    ListingFailed { prefix: String, reason: String },

    /// Batches before `batch` were deleted and stay deleted.
    #[error("failed to delete objects batch {batch} ({deleted_before} objects already deleted): {reason}")]
    BatchDeleteFailed {
        batch: usize,
        deleted_before: usize,
        reason: String,
    },

    #[error("failed to upload {} to '{key}': {reason}", path.display())]
    UploadFailed {
        path: PathBuf,
        key: String,
        reason: String,
    },

    #[error("failed to download '{key}': {reason}")]
    DownloadFailed { key: String, reason: String },

    #[error("no files found in folder: {0}")]
    NoObjectsFound(String),

    #[error("failed to create destination directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} timed out after {}", humantime::format_duration(*after))]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{0} cancelled")]
    Cancelled(&'static str),

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),
}

impl Error {
    /// Map a failed stat into the not-found / inaccessible split.
    pub(crate) fn from_stat(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::PathNotFound(path)
        } else {
            Error::PathInaccessible { path, source: err }
        }
    }
}
