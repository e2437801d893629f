//! Record subsets and the primary-key index
//!
//! A `Subset` is a cheaply clonable, immutable list of shared records. The
//! primary-key index over it is built on first use and cached inside the
//! subset, so every clone of an ad hoc subset shares one index no matter how
//! many queries run over it.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rayon::prelude::*;

use crate::config::ParallelConfig;
use crate::query::error::QueryResult;
use crate::query::filter::Predicate;
use crate::types::{Record, RecordId};

/// Index of record positions by primary key
///
/// When a subset holds the same id more than once, the first occurrence wins.
#[derive(Debug, Default)]
pub struct PrimaryKeyIndex {
    positions: HashMap<RecordId, usize>,
    unique: Vec<usize>,
}

impl PrimaryKeyIndex {
    pub(crate) fn build(records: &[Arc<Record>]) -> Self {
        let mut positions = HashMap::with_capacity(records.len());
        let mut unique = Vec::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if let std::collections::hash_map::Entry::Vacant(slot) = positions.entry(record.id) {
                slot.insert(pos);
                unique.push(pos);
            }
        }
        Self { positions, unique }
    }

    /// Position of the record with `id`
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Positions of distinct records, in subset order
    pub fn unique_positions(&self) -> &[usize] {
        &self.unique
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.unique.len()
    }

    /// True if the index is empty
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }
}

struct SubsetInner {
    records: Vec<Arc<Record>>,
    index: OnceCell<PrimaryKeyIndex>,
}

/// An immutable collection of records
#[derive(Clone)]
pub struct Subset {
    inner: Arc<SubsetInner>,
}

impl Subset {
    /// Wrap a list of shared records
    pub fn new(records: Vec<Arc<Record>>) -> Self {
        Self {
            inner: Arc::new(SubsetInner {
                records,
                index: OnceCell::new(),
            }),
        }
    }

    /// Build a subset from owned records
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        Self::new(records.into_iter().map(Arc::new).collect())
    }

    /// An empty subset
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Records in subset order
    pub fn records(&self) -> &[Arc<Record>] {
        &self.inner.records
    }

    /// Iterate over records
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.inner.records.iter().map(|r| r.as_ref())
    }

    /// Number of records, duplicates included
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// True if there are no records
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// True once the primary-key index has been built
    pub fn is_indexed(&self) -> bool {
        self.inner.index.get().is_some()
    }

    /// Primary-key index, built on first call
    pub fn index(&self) -> &PrimaryKeyIndex {
        self.inner
            .index
            .get_or_init(|| PrimaryKeyIndex::build(&self.inner.records))
    }

    /// Record with the given id
    pub fn get(&self, id: RecordId) -> Option<&Arc<Record>> {
        self.index()
            .position(id)
            .map(|pos| &self.inner.records[pos])
    }

    /// True if a record with `id` is present
    pub fn contains(&self, id: RecordId) -> bool {
        self.index().position(id).is_some()
    }

    /// Ids in subset order, duplicates included
    pub fn ids(&self) -> Vec<RecordId> {
        self.iter().map(|r| r.id).collect()
    }

    /// True if both handles share the same underlying records
    pub fn ptr_eq(&self, other: &Subset) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Wrap in a primary-key index
    pub fn indexed(self) -> IndexedSubset {
        IndexedSubset::new(self)
    }

    /// Records matching `predicate`, deduplicated by primary key, in subset order
    ///
    /// Builds the primary-key index if this subset has none yet. Above the
    /// parallel threshold, morsels of the subset are evaluated on the rayon
    /// pool and concatenated in order.
    pub fn retrieve(&self, predicate: &Predicate, parallel: &ParallelConfig) -> QueryResult<Subset> {
        let index = self.index();
        let records = &self.inner.records;

        if predicate.is_always() && index.len() == records.len() {
            return Ok(self.clone());
        }

        let positions = index.unique_positions();
        let keep = |pos: &usize| -> QueryResult<Option<Arc<Record>>> {
            let record = &records[*pos];
            Ok(predicate.matches(record)?.then(|| record.clone()))
        };

        let matched: Vec<Arc<Record>> = if parallel.should_parallelize(positions.len()) {
            let morsels: Vec<Vec<Arc<Record>>> = positions
                .par_chunks(parallel.morsel_size)
                .map(|morsel| {
                    let mut out = Vec::new();
                    for pos in morsel {
                        if let Some(record) = keep(pos)? {
                            out.push(record);
                        }
                    }
                    Ok(out)
                })
                .collect::<QueryResult<_>>()?;
            morsels.into_iter().flatten().collect()
        } else {
            let mut out = Vec::new();
            for pos in positions {
                if let Some(record) = keep(pos)? {
                    out.push(record);
                }
            }
            out
        };

        Ok(Subset::new(matched))
    }
}

impl Default for Subset {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subset")
            .field("len", &self.len())
            .field("indexed", &self.is_indexed())
            .finish()
    }
}

impl FromIterator<Arc<Record>> for Subset {
    fn from_iter<I: IntoIterator<Item = Arc<Record>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A subset whose primary-key index is already built
#[derive(Clone, Debug)]
pub struct IndexedSubset {
    subset: Subset,
}

impl IndexedSubset {
    /// Build the index for `subset`
    pub fn new(subset: Subset) -> Self {
        subset.index();
        Self { subset }
    }

    /// Underlying subset
    pub fn as_subset(&self) -> &Subset {
        &self.subset
    }

    /// Unwrap into the underlying subset
    pub fn into_subset(self) -> Subset {
        self.subset
    }
}

impl Deref for IndexedSubset {
    type Target = Subset;

    fn deref(&self) -> &Subset {
        &self.subset
    }
}

impl AsRef<Subset> for IndexedSubset {
    fn as_ref(&self) -> &Subset {
        &self.subset
    }
}

impl From<IndexedSubset> for Subset {
    fn from(indexed: IndexedSubset) -> Self {
        indexed.subset
    }
}
