//! Indexed record store
//!
//! Holds the current namespace snapshot and its three named views.
//!
//! # Architecture
//!
//! ```text
//! loader ──refresh(records)──► RecordStore ──snapshot()──► Arc<Snapshot>
//!                               (RwLock)                     ├── "all"
//!                                                            ├── "files"
//!                                                            └── "dirs"
//! ```
//!
//! A refresh builds a complete new `Snapshot` off to the side and swaps the
//! `Arc` under a short write lock. Callers that pinned the previous snapshot
//! keep reading it undisturbed until they drop it.
//!
//! # Example
//!
//! ```rust
//! use namespace_query::storage::RecordStore;
//! use namespace_query::types::{DirAttrs, FileAttrs, Record};
//!
//! let store = RecordStore::new(vec![
//!     Record::directory(1, "/data", DirAttrs::default()),
//!     Record::file(2, "/data/a.txt", FileAttrs::new(10, 3, 128)),
//! ]);
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.set("all").unwrap().len(), 2);
//! assert_eq!(snapshot.set("files").unwrap().len(), 1);
//! assert!(snapshot.set("links").is_err());
//! ```

/// Record subsets and the primary-key index
pub mod subset;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::query::error::{join_valid, QueryError, QueryResult};
use crate::types::Record;

pub use subset::{IndexedSubset, PrimaryKeyIndex, Subset};

/// Names of the predefined record sets
pub const VALID_SETS: &[&str] = &["all", "files", "dirs"];

/// One immutable generation of the namespace
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    all: IndexedSubset,
    files: IndexedSubset,
    dirs: IndexedSubset,
}

impl Snapshot {
    /// Materialize the named views over `records`
    pub fn new(records: Vec<Record>) -> Self {
        Self::with_generation(records, 0)
    }

    fn with_generation(records: Vec<Record>, generation: u64) -> Self {
        let raw: Vec<Arc<Record>> = records.into_iter().map(Arc::new).collect();
        let index = PrimaryKeyIndex::build(&raw);
        if index.len() != raw.len() {
            warn!(
                records = raw.len(),
                distinct = index.len(),
                "Snapshot contains duplicate record ids; first occurrence wins"
            );
        }

        // Every view is built from the deduplicated records so an id lands in
        // exactly one of files/dirs.
        let all: Vec<Arc<Record>> = index.unique_positions().iter().map(|&pos| raw[pos].clone()).collect();
        let files: Vec<Arc<Record>> = all.iter().filter(|r| r.is_file()).cloned().collect();
        let dirs: Vec<Arc<Record>> = all.iter().filter(|r| r.is_dir()).cloned().collect();

        Self {
            generation,
            all: Subset::new(all).indexed(),
            files: Subset::new(files).indexed(),
            dirs: Subset::new(dirs).indexed(),
        }
    }

    /// Look up a named set
    pub fn set(&self, name: &str) -> QueryResult<IndexedSubset> {
        match name {
            "all" => Ok(self.all.clone()),
            "files" => Ok(self.files.clone()),
            "dirs" => Ok(self.dirs.clone()),
            _ => Err(QueryError::UnknownSet {
                name: name.to_string(),
                valid: join_valid(VALID_SETS),
            }),
        }
    }

    /// Refresh generation this snapshot belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of records in the snapshot
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// True if the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Holder of the current snapshot
#[derive(Debug)]
pub struct RecordStore {
    current: RwLock<Arc<Snapshot>>,
    generation: AtomicU64,
}

impl RecordStore {
    /// Create a store over an initial record collection
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::new(records))),
            generation: AtomicU64::new(0),
        }
    }

    /// Create an empty store
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Pin the current snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Look up a named set in the current snapshot
    pub fn set(&self, name: &str) -> QueryResult<IndexedSubset> {
        self.snapshot().set(name)
    }

    /// Replace the snapshot with a new record collection
    ///
    /// Returns the generation assigned to this refresh. When refreshes race,
    /// the store always ends on the highest generation.
    pub fn refresh(&self, records: Vec<Record>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(Snapshot::with_generation(records, generation));
        let len = snapshot.len();

        // Concurrent refreshes may finish out of order; never go backwards.
        let mut current = self.current.write();
        if current.generation() > generation {
            drop(current);
            warn!(
                generation = generation,
                "Discarding refresh superseded by a newer generation"
            );
            return generation;
        }
        *current = snapshot;
        drop(current);

        info!(generation = generation, records = len, "Record store refreshed");
        generation
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DirAttrs, FileAttrs};

    fn sample() -> Vec<Record> {
        vec![
            Record::directory(1, "/", DirAttrs::default()),
            Record::directory(2, "/user", DirAttrs::default()),
            Record::file(3, "/user/a", FileAttrs::new(10, 3, 128)),
            Record::file(4, "/user/b", FileAttrs::new(20, 3, 128)),
        ]
    }

    #[test]
    fn test_named_sets_partition() {
        let store = RecordStore::new(sample());
        let snapshot = store.snapshot();
        let files = snapshot.set("files").unwrap();
        let dirs = snapshot.set("dirs").unwrap();

        assert_eq!(snapshot.set("all").unwrap().len(), 4);
        assert_eq!(files.ids(), vec![3, 4]);
        assert_eq!(dirs.ids(), vec![1, 2]);
        assert!(files.ids().iter().all(|id| !dirs.contains(*id)));
        assert!(files.is_indexed());
    }

    #[test]
    fn test_unknown_set() {
        let store = RecordStore::new(sample());
        match store.set("symlinks").unwrap_err() {
            QueryError::UnknownSet { name, valid } => {
                assert_eq!(name, "symlinks");
                assert_eq!(valid, "all, files, dirs");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_id_lands_in_one_set() {
        let store = RecordStore::new(vec![
            Record::directory(7, "/d", DirAttrs::default()),
            Record::file(7, "/d/f", FileAttrs::new(1, 1, 128)),
            Record::file(8, "/d/g", FileAttrs::new(1, 1, 128)),
        ]);
        let snapshot = store.snapshot();
        let all = snapshot.set("all").unwrap();
        let files = snapshot.set("files").unwrap();
        let dirs = snapshot.set("dirs").unwrap();

        assert_eq!(all.ids(), vec![7, 8]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(dirs.ids(), vec![7]);
        assert_eq!(files.ids(), vec![8]);
        assert!(files.ids().iter().all(|id| !dirs.contains(*id)));
        assert_eq!(files.len() + dirs.len(), all.len());
    }

    #[test]
    fn test_concurrent_refresh_ends_on_latest_generation() {
        let store = Arc::new(RecordStore::new(sample()));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        // Uneven sizes so snapshot builds finish out of order
                        let count = ((t * 25 + i) % 7) * 50;
                        let records = (0..count)
                            .map(|id| Record::file(id as i64, format!("/f{id}"), FileAttrs::new(1, 1, 128)))
                            .collect();
                        store.refresh(records);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.snapshot().generation(), 200);
    }

    #[test]
    fn test_stale_refresh_is_discarded() {
        let store = RecordStore::new(sample());
        store.generation.store(5, Ordering::SeqCst);
        assert_eq!(store.refresh(Vec::new()), 6);

        // A refresh that drew an older generation must not replace a newer one
        *store.current.write() = Arc::new(Snapshot::with_generation(sample(), 9));
        assert_eq!(store.refresh(Vec::new()), 7);
        assert_eq!(store.snapshot().generation(), 9);
        assert_eq!(store.snapshot().len(), 4);
    }

    #[test]
    fn test_refresh_keeps_pinned_snapshot() {
        let store = RecordStore::new(sample());
        let pinned = store.snapshot();

        let generation = store.refresh(vec![Record::file(9, "/z", FileAttrs::new(1, 1, 1))]);
        assert_eq!(generation, 1);

        assert_eq!(pinned.len(), 4);
        assert_eq!(pinned.generation(), 0);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.snapshot().generation(), 1);
        assert!(store.set("dirs").unwrap().is_empty());
    }
}
