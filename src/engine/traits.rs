//! Collaborator traits consumed by the engine
//!
//! The engine depends on two things it does not own:
//! - a version-compatibility layer that knows how fields whose computation
//!   differs across releases of the backing filesystem are extracted
//! - a wall clock, read at call time by relative-time filters and
//!   age-based histograms

use chrono::Utc;

use crate::types::{EpochMillis, Record};

/// Extraction closures for version-dependent fields
pub trait VersionCompat: Send + Sync + 'static {
    /// Unique identifier for this compatibility layer
    fn compat_id(&self) -> &str;

    /// Storage policy code of a record
    fn storage_policy(&self, record: &Record) -> i64;

    /// Bytes below a directory; 0 for files
    fn subtree_size(&self, record: &Record) -> i64;

    /// Files below a directory; 0 for files
    fn subtree_files(&self, record: &Record) -> i64;

    /// Directories below a directory; 0 for files
    fn subtree_dirs(&self, record: &Record) -> i64;

    /// Direct children of a directory; 0 for files
    fn child_count(&self, record: &Record) -> i64 {
        record.as_dir().map(|d| d.child_count).unwrap_or(0)
    }

    /// Storage policy labels in canonical order, as (code, label)
    fn storage_policies(&self) -> &[(i64, &'static str)];
}

/// Standard storage policy table
pub const DEFAULT_STORAGE_POLICIES: &[(i64, &str)] = &[
    (0, "UNSPECIFIED"),
    (1, "PROVIDED"),
    (2, "COLD"),
    (5, "WARM"),
    (7, "HOT"),
    (10, "ONE_SSD"),
    (12, "ALL_SSD"),
    (15, "LAZY_PERSIST"),
];

/// Compatibility layer that reads every field straight from the record
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompat;

impl VersionCompat for DefaultCompat {
    fn compat_id(&self) -> &str {
        "default"
    }

    fn storage_policy(&self, record: &Record) -> i64 {
        record.storage_policy as i64
    }

    fn subtree_size(&self, record: &Record) -> i64 {
        record.as_dir().map(|d| d.subtree_size).unwrap_or(0)
    }

    fn subtree_files(&self, record: &Record) -> i64 {
        record.as_dir().map(|d| d.subtree_files).unwrap_or(0)
    }

    fn subtree_dirs(&self, record: &Record) -> i64 {
        record.as_dir().map(|d| d.subtree_dirs).unwrap_or(0)
    }

    fn storage_policies(&self) -> &[(i64, &'static str)] {
        DEFAULT_STORAGE_POLICIES
    }
}

/// Source of "now"
pub trait Clock: Send + Sync + 'static {
    /// Current time in epoch millis
    fn now_millis(&self) -> EpochMillis;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// Clock pinned to a fixed instant, for reproducible relative-time queries
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub EpochMillis);

impl Clock for FixedClock {
    fn now_millis(&self) -> EpochMillis {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DirAttrs, FileAttrs};

    #[test]
    fn test_default_compat_foreign_variant() {
        let compat = DefaultCompat;
        let file = Record::file(1, "/a", FileAttrs::new(10, 3, 128)).with_storage_policy(7);
        let dir = Record::directory(
            2,
            "/b",
            DirAttrs {
                child_count: 4,
                subtree_size: 900,
                subtree_files: 3,
                subtree_dirs: 1,
                has_quota: true,
            },
        );

        assert_eq!(compat.storage_policy(&file), 7);
        assert_eq!(compat.subtree_size(&file), 0);
        assert_eq!(compat.child_count(&file), 0);
        assert_eq!(compat.subtree_size(&dir), 900);
        assert_eq!(compat.subtree_files(&dir), 3);
        assert_eq!(compat.subtree_dirs(&dir), 1);
        assert_eq!(compat.child_count(&dir), 4);
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(42).now_millis(), 42);
        assert!(SystemClock.now_millis() > 1_600_000_000_000);
    }
}
