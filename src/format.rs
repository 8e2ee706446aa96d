// src/format.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Human-readable sizes, timestamps and durations used in result objects.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Binary-unit size string: `512 B`, `1.5 KB`, `2.0 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, suffix)
}

/// RFC 3339 with second precision and a `Z` suffix.
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Elapsed time truncated to milliseconds, e.g. `1s 234ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = Duration::from_millis(elapsed.as_millis() as u64);
    if millis.is_zero() {
        return "0s".to_string();
    }
    humantime::format_duration(millis).to_string()
}
