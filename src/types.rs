//! Core data types used throughout the engine
//!
//! # Key Types
//!
//! - **`Record`**: One filesystem entry with its typed metadata
//! - **`RecordKind`**: Tagged variant carrying file- or directory-only attributes
//! - **`RecordId`**: Primary key of a record (unique across the namespace)
//!
//! Records are produced by an external loader and are never mutated by the
//! engine. Accessors for attributes of the other variant return explicit
//! defaults (a directory has a file size of 0, a file has no quota).
//!
//! # Example
//!
//! ```rust
//! use namespace_query::types::{FileAttrs, Record};
//!
//! let record = Record::file(7, "/data/logs/app.log", FileAttrs::new(4096, 3, 134_217_728))
//!     .with_owner("hdfs", "supergroup");
//!
//! assert_eq!(record.name, "app.log");
//! assert_eq!(record.depth(), 3);
//! assert_eq!(record.parent_path(), Some("/data/logs"));
//! assert_eq!(record.diskspace_consumed(), 4096 * 3);
//! ```

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Primary key of a record
pub type RecordId = i64;

/// Milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// Textual day format used for date attributes and date filter operands
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Fixed per-record memory heuristic (bytes) for every entry
pub const RECORD_MEMORY_BYTES: i64 = 100;

/// Fixed per-block memory heuristic (bytes) for files
pub const BLOCK_MEMORY_BYTES: i64 = 150;

/// File-only attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttrs {
    /// Logical file length in bytes
    pub size: i64,
    /// Replication factor
    pub replication: u16,
    /// Preferred block size in bytes
    pub preferred_block_size: i64,
    /// Number of blocks
    pub num_blocks: i64,
    /// File is open for write
    pub under_construction: bool,
    /// File is captured in a snapshot
    pub has_snapshot: bool,
}

impl FileAttrs {
    /// Create file attributes, deriving the block count from the block size
    pub fn new(size: i64, replication: u16, preferred_block_size: i64) -> Self {
        let num_blocks = if preferred_block_size > 0 && size > 0 {
            size / preferred_block_size + i64::from(size % preferred_block_size != 0)
        } else {
            0
        };
        Self {
            size,
            replication,
            preferred_block_size,
            num_blocks,
            under_construction: false,
            has_snapshot: false,
        }
    }
}

/// Directory-only attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirAttrs {
    /// Number of direct children
    pub child_count: i64,
    /// Total bytes below this directory
    pub subtree_size: i64,
    /// Number of files below this directory
    pub subtree_files: i64,
    /// Number of directories below this directory
    pub subtree_dirs: i64,
    /// A namespace or space quota is set
    pub has_quota: bool,
}

/// Variant of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// Regular file
    File(FileAttrs),
    /// Directory
    Directory(DirAttrs),
}

/// One filesystem entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key
    pub id: RecordId,
    /// Local name (last path component)
    pub name: String,
    /// Absolute, normalized path
    pub path: String,
    /// Owner
    pub user: String,
    /// Owning group
    pub group: String,
    /// Permission bits
    pub permission: u32,
    /// Last access time
    pub access_time: EpochMillis,
    /// Last modification time
    pub mod_time: EpochMillis,
    /// Storage policy code (meaning depends on the backing system version)
    pub storage_policy: u8,
    /// Entry carries an ACL
    pub has_acl: bool,
    /// File or directory attributes
    pub kind: RecordKind,
}

impl Record {
    fn new(id: RecordId, path: impl Into<String>, kind: RecordKind) -> Self {
        let path = path.into();
        let name = local_name(&path).to_string();
        Self {
            id,
            name,
            path,
            user: String::new(),
            group: String::new(),
            permission: 0o644,
            access_time: 0,
            mod_time: 0,
            storage_policy: 0,
            has_acl: false,
            kind,
        }
    }

    /// Create a file record
    pub fn file(id: RecordId, path: impl Into<String>, attrs: FileAttrs) -> Self {
        Self::new(id, path, RecordKind::File(attrs))
    }

    /// Create a directory record
    pub fn directory(id: RecordId, path: impl Into<String>, attrs: DirAttrs) -> Self {
        let mut record = Self::new(id, path, RecordKind::Directory(attrs));
        record.permission = 0o755;
        record
    }

    /// Set owner and group
    pub fn with_owner(mut self, user: impl Into<String>, group: impl Into<String>) -> Self {
        self.user = user.into();
        self.group = group.into();
        self
    }

    /// Set access and modification times
    pub fn with_times(mut self, access_time: EpochMillis, mod_time: EpochMillis) -> Self {
        self.access_time = access_time;
        self.mod_time = mod_time;
        self
    }

    /// Set permission bits
    pub fn with_permission(mut self, permission: u32) -> Self {
        self.permission = permission;
        self
    }

    /// Set the storage policy code
    pub fn with_storage_policy(mut self, policy: u8) -> Self {
        self.storage_policy = policy;
        self
    }

    /// Mark the entry as carrying an ACL
    pub fn with_acl(mut self, has_acl: bool) -> Self {
        self.has_acl = has_acl;
        self
    }

    /// True for file records
    #[inline]
    pub fn is_file(&self) -> bool {
        matches!(self.kind, RecordKind::File(_))
    }

    /// True for directory records
    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, RecordKind::Directory(_))
    }

    /// File attributes, if this is a file
    #[inline]
    pub fn as_file(&self) -> Option<&FileAttrs> {
        match &self.kind {
            RecordKind::File(f) => Some(f),
            RecordKind::Directory(_) => None,
        }
    }

    /// Directory attributes, if this is a directory
    #[inline]
    pub fn as_dir(&self) -> Option<&DirAttrs> {
        match &self.kind {
            RecordKind::Directory(d) => Some(d),
            RecordKind::File(_) => None,
        }
    }

    /// File length; 0 for directories
    #[inline]
    pub fn file_size(&self) -> i64 {
        self.as_file().map(|f| f.size).unwrap_or(0)
    }

    /// Replication factor; 0 for directories
    #[inline]
    pub fn replication(&self) -> i64 {
        self.as_file().map(|f| f.replication as i64).unwrap_or(0)
    }

    /// Preferred block size; 0 for directories
    #[inline]
    pub fn preferred_block_size(&self) -> i64 {
        self.as_file().map(|f| f.preferred_block_size).unwrap_or(0)
    }

    /// Block count; 0 for directories
    #[inline]
    pub fn num_blocks(&self) -> i64 {
        self.as_file().map(|f| f.num_blocks).unwrap_or(0)
    }

    /// Bytes consumed across all replicas
    #[inline]
    pub fn diskspace_consumed(&self) -> i64 {
        self.file_size().saturating_mul(self.replication())
    }

    /// Block replicas across the cluster
    #[inline]
    pub fn num_replicas(&self) -> i64 {
        self.num_blocks().saturating_mul(self.replication())
    }

    /// Estimated heap footprint of the entry in the namespace server
    #[inline]
    pub fn memory_consumed(&self) -> i64 {
        RECORD_MEMORY_BYTES.saturating_add(self.num_blocks().saturating_mul(BLOCK_MEMORY_BYTES))
    }

    /// Number of path components; the root is depth 0
    pub fn depth(&self) -> i64 {
        self.path.split('/').filter(|c| !c.is_empty()).count() as i64
    }

    /// Path of the containing directory; `None` for the root
    pub fn parent_path(&self) -> Option<&str> {
        if self.path == "/" || self.path.is_empty() {
            return None;
        }
        match self.path.rfind('/') {
            Some(0) => Some("/"),
            Some(idx) => Some(&self.path[..idx]),
            None => None,
        }
    }

    /// Ancestor directory at `depth` (root = 0)
    ///
    /// Returns `None` when the containing directory is shallower than
    /// `depth`. The result always borrows a prefix of the record's path.
    pub fn ancestor_at_depth(&self, depth: usize) -> Option<&str> {
        let parent_depth = (self.depth() as usize).checked_sub(1)?;
        if parent_depth < depth {
            return None;
        }
        if depth == 0 {
            return Some("/");
        }
        // The (depth + 1)-th slash terminates the depth-th component.
        self.path
            .match_indices('/')
            .nth(depth)
            .map(|(idx, _)| &self.path[..idx])
    }

    /// Day of the last modification (UTC)
    pub fn mod_date(&self) -> Option<NaiveDate> {
        day_of(self.mod_time)
    }

    /// Day of the last access (UTC)
    pub fn access_date(&self) -> Option<NaiveDate> {
        day_of(self.access_time)
    }
}

/// Last component of a path; `"/"` is its own name
pub fn local_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Truncate epoch millis to a UTC calendar day
///
/// The day goes through its `MM/dd/yyyy` rendering so that record dates and
/// parsed filter operands compare at exactly the same granularity.
pub fn day_of(millis: EpochMillis) -> Option<NaiveDate> {
    let rendered = DateTime::from_timestamp_millis(millis)?
        .format(DATE_FORMAT)
        .to_string();
    parse_day(&rendered)
}

/// Parse a `MM/dd/yyyy` day
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("/a/b/c.txt"), "c.txt");
        assert_eq!(local_name("/a"), "a");
        assert_eq!(local_name("/"), "/");
    }

    #[test]
    fn test_foreign_variant_defaults() {
        let dir = Record::directory(1, "/warehouse", DirAttrs::default());
        assert_eq!(dir.file_size(), 0);
        assert_eq!(dir.replication(), 0);
        assert_eq!(dir.num_blocks(), 0);
        assert_eq!(dir.memory_consumed(), RECORD_MEMORY_BYTES);
        assert!(dir.as_file().is_none());
    }

    #[test]
    fn test_block_count_derivation() {
        let attrs = FileAttrs::new(300, 2, 128);
        assert_eq!(attrs.num_blocks, 3);
        assert_eq!(FileAttrs::new(0, 3, 128).num_blocks, 0);

        let file = Record::file(2, "/f", attrs);
        assert_eq!(file.num_replicas(), 6);
        assert_eq!(file.memory_consumed(), 100 + 3 * 150);
    }

    #[test]
    fn test_huge_sizes_do_not_overflow() {
        let attrs = FileAttrs::new(i64::MAX - 10, 3, 128);
        assert_eq!(attrs.num_blocks, i64::MAX / 128 + 1);
        assert_eq!(FileAttrs::new(i64::MAX, 1, 1).num_blocks, i64::MAX);

        let file = Record::file(1, "/huge", attrs);
        assert_eq!(file.diskspace_consumed(), i64::MAX);
        assert_eq!(file.num_replicas(), 3 << 56);
        assert_eq!(file.memory_consumed(), i64::MAX);

        let max = Record::file(2, "/max", FileAttrs::new(i64::MAX, 1, 1));
        assert_eq!(max.memory_consumed(), i64::MAX);
    }

    #[test]
    fn test_depth_and_parent() {
        let root = Record::directory(0, "/", DirAttrs::default());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.parent_path(), None);

        let top = Record::directory(1, "/user", DirAttrs::default());
        assert_eq!(top.depth(), 1);
        assert_eq!(top.parent_path(), Some("/"));

        let file = Record::file(2, "/user/alice/data.csv", FileAttrs::new(1, 1, 1));
        assert_eq!(file.depth(), 3);
        assert_eq!(file.parent_path(), Some("/user/alice"));
    }

    #[test]
    fn test_ancestor_at_depth() {
        let file = Record::file(2, "/user/alice/logs/app.log", FileAttrs::new(1, 1, 1));
        assert_eq!(file.ancestor_at_depth(0), Some("/"));
        assert_eq!(file.ancestor_at_depth(1), Some("/user"));
        assert_eq!(file.ancestor_at_depth(2), Some("/user/alice"));
        assert_eq!(file.ancestor_at_depth(3), Some("/user/alice/logs"));
        assert_eq!(file.ancestor_at_depth(4), None);

        let root = Record::directory(0, "/", DirAttrs::default());
        assert_eq!(root.ancestor_at_depth(0), None);
    }

    #[test]
    fn test_day_truncation() {
        // 2021-03-04T23:59:59.999Z
        let millis = 1_614_902_399_999;
        assert_eq!(day_of(millis), NaiveDate::from_ymd_opt(2021, 3, 4));
        assert_eq!(day_of(millis + 1), NaiveDate::from_ymd_opt(2021, 3, 5));
        assert_eq!(parse_day("03/04/2021"), NaiveDate::from_ymd_opt(2021, 3, 4));
        assert_eq!(parse_day("2021-03-04"), None);
        assert_eq!(day_of(i64::MAX), None);
    }
}
