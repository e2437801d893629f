//! Aggregation functions
//!
//! The fixed table of scalar reducers. Every reducer is a sum of a
//! per-record contribution, so it is associative and commutative and the
//! histogram engine's sum mode reuses the same contribution per bucket.
//!
//! | Name | Contribution |
//! |------|--------------|
//! | `count` | 1 |
//! | `fileSize` | file length, 0 for directories |
//! | `diskspaceConsumed` | file length × replication |
//! | `blockSize` | preferred block size |
//! | `numBlocks` | block count |
//! | `numReplicas` | block count × replication |
//! | `memoryConsumed` | 100 + 150 × block count for files, 100 for directories |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::ParallelConfig;
use crate::query::catalog::LongFn;
use crate::query::error::{join_valid, QueryError, QueryResult};
use crate::storage::Subset;
use crate::types::Record;

/// A named scalar reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    /// Number of records
    Count,
    /// Σ file length
    FileSize,
    /// Σ file length × replication
    DiskspaceConsumed,
    /// Σ preferred block size
    BlockSize,
    /// Σ block count
    NumBlocks,
    /// Σ block count × replication
    NumReplicas,
    /// Σ estimated namespace heap footprint
    MemoryConsumed,
}

impl Aggregation {
    /// Every aggregation, in table order
    pub const ALL: [Aggregation; 7] = [
        Aggregation::Count,
        Aggregation::FileSize,
        Aggregation::DiskspaceConsumed,
        Aggregation::BlockSize,
        Aggregation::NumBlocks,
        Aggregation::NumReplicas,
        Aggregation::MemoryConsumed,
    ];

    /// Name used by callers
    pub fn name(self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::FileSize => "fileSize",
            Aggregation::DiskspaceConsumed => "diskspaceConsumed",
            Aggregation::BlockSize => "blockSize",
            Aggregation::NumBlocks => "numBlocks",
            Aggregation::NumReplicas => "numReplicas",
            Aggregation::MemoryConsumed => "memoryConsumed",
        }
    }

    /// Every aggregation name
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|a| a.name()).collect()
    }

    /// Look up an aggregation by name
    pub fn parse(name: &str) -> QueryResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == name)
            .ok_or_else(|| QueryError::UnknownAggregation {
                name: name.to_string(),
                valid: join_valid(Self::names()),
            })
    }

    /// Contribution of one record
    #[inline]
    pub fn contribution(self, record: &Record) -> i64 {
        match self {
            Aggregation::Count => 1,
            Aggregation::FileSize => record.file_size(),
            Aggregation::DiskspaceConsumed => record.diskspace_consumed(),
            Aggregation::BlockSize => record.preferred_block_size(),
            Aggregation::NumBlocks => record.num_blocks(),
            Aggregation::NumReplicas => record.num_replicas(),
            Aggregation::MemoryConsumed => record.memory_consumed(),
        }
    }

    /// Contribution as a shareable extractor
    pub fn extractor(self) -> LongFn {
        Arc::new(move |record: &Record| self.contribution(record))
    }

    /// Reduce a subset to a scalar
    ///
    /// Morsels are summed on the rayon pool above the parallel threshold and
    /// the partial sums merged.
    pub fn sum(self, subset: &Subset, parallel: &ParallelConfig) -> i64 {
        let records = subset.records();
        if self == Aggregation::Count {
            return records.len() as i64;
        }

        let sum_morsel = |morsel: &[Arc<Record>]| {
            morsel
                .iter()
                .fold(0i64, |acc, r| acc.saturating_add(self.contribution(r)))
        };

        if parallel.should_parallelize(records.len()) {
            records
                .par_chunks(parallel.morsel_size)
                .map(sum_morsel)
                .reduce(|| 0, i64::saturating_add)
        } else {
            sum_morsel(records)
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregation {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
