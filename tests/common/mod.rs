// tests/common/mod.rs
//
// Shared fixtures: an in-memory bucket behind a Client, and small local trees to upload.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use s3manager::{Client, MemoryObjectStore, StorageCredentials};
use tempfile::TempDir;

pub const BUCKET: &str = "test-bucket";

pub fn credentials() -> StorageCredentials {
    StorageCredentials::new(
        Some("http://localhost:9000".to_string()),
        "eu-west-1",
        "AKIATESTKEY",
        "test-secret",
        BUCKET,
    )
    .expect("valid test credentials")
}

/// A client over `store` whose archives are built in `scratch`.
pub fn client(store: &Arc<MemoryObjectStore>, scratch: &Path) -> Client {
    Client::with_store(credentials(), store.clone()).with_scratch_dir(scratch)
}

pub fn store() -> Arc<MemoryObjectStore> {
    let store = Arc::new(MemoryObjectStore::new());
    store.create_bucket(BUCKET, Some("eu-west-1"), None);
    store
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// ```text
/// <tmp>/project/README.md          5 bytes
/// <tmp>/project/src/main.rs        12 bytes
/// <tmp>/project/target/app.bin     1000 bytes
/// <tmp>/notes.txt                  2 bytes
/// ```
pub struct Tree {
    pub dir: TempDir,
}

impl Tree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let project = dir.path().join("project");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::create_dir_all(project.join("target")).unwrap();
        fs::write(project.join("README.md"), b"hello").unwrap();
        fs::write(project.join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(project.join("target/app.bin"), vec![0u8; 1000]).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        Self { dir }
    }

    pub fn project(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    pub fn notes(&self) -> PathBuf {
        self.dir.path().join("notes.txt")
    }
}

pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(false)
}
