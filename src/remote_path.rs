// src/remote_path.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Mapping between local names and remote object keys.
//!
//! `resolve` does not collapse `..` segments or repeated slashes inside the destination
//! prefix; a crafted destination can therefore address keys outside the intended folder.

/// Remote key for `filename` under `destination`. Never starts with `/`.
pub fn resolve(destination: &str, filename: &str) -> String {
    if destination.is_empty() {
        return filename.to_string();
    }
    let trimmed = destination.trim_start_matches('/');
    if trimmed.is_empty() {
        return filename.to_string();
    }
    let mut key = String::with_capacity(trimmed.len() + 1 + filename.len());
    key.push_str(trimmed.trim_end_matches('/'));
    key.push('/');
    key.push_str(filename);
    key
}

/// Listing prefix for a folder: non-empty folders get a trailing `/` so `logs` does not
/// match `logs-old/...`.
pub fn listing_prefix(folder: &str) -> String {
    if folder.is_empty() || folder.ends_with('/') {
        folder.to_string()
    } else {
        format!("{folder}/")
    }
}

/// Last non-empty segment of a key (`a/b/c.txt` → `c.txt`, `a/b/` → `b`).
pub fn key_base_name(key: &str) -> Option<&str> {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Join path components into a key fragment with `/` separators.
pub(crate) fn join_components<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
