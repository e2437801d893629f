//! Histogram engine
//!
//! Buckets a subset along a derived dimension and reduces each bucket.
//!
//! # Architecture
//!
//! ```text
//! ranged:    record ─dimension─► i64 ─RangedLayout::bucket_of─► bucket ─┐
//!                                                                      ├─► shard[bucket].add(value)
//! discrete:  record ─labeler──► label ─KeyTable::id_of────────► bucket ─┘
//!
//! shards: rayon fold (one Vec<Cell> per worker) ─► reduce (elementwise merge)
//! ```
//!
//! A discrete-key histogram makes two passes: the first extracts every
//! record's label and discovers the key table, the second buckets. Neither
//! pass depends on the number of buckets.
//!
//! Buckets are accumulated in per-worker shards merged at the end, so no
//! bucket update is ever shared between threads.

use std::borrow::Cow;

use rayon::prelude::*;
use tracing::debug;

use crate::aggregation::accumulate::{AvgCell, BucketCell, FindMode, MaxCell, MinCell, Reduction, SumCell};
use crate::aggregation::data_model::Histogram;
use crate::aggregation::layout::{KeyOrder, KeyTable, RangedLayout};
use crate::config::ParallelConfig;
use crate::query::error::QueryResult;
use crate::storage::Subset;
use crate::types::Record;

/// Result of a discrete-key histogram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteHistogram {
    /// Exported buckets, sentinel excluded
    pub histogram: Histogram,
    /// Records routed to the `NO_MAPPING` sentinel
    pub unmapped_records: usize,
    /// Reduced value of the sentinel bucket before it was stripped
    pub unmapped_value: i64,
}

/// Stateless bucketing engine; all accumulation state lives in one call
#[derive(Debug, Clone, Default)]
pub struct HistogramEngine {
    parallel: ParallelConfig,
}

impl HistogramEngine {
    /// Create an engine with the given fan-out settings
    pub fn new(parallel: ParallelConfig) -> Self {
        Self { parallel }
    }

    /// Fan-out settings
    pub fn parallel(&self) -> &ParallelConfig {
        &self.parallel
    }

    /// Bucket by a numeric dimension into fixed ranges
    ///
    /// Every layout bucket is exported, in layout order, including empty ones.
    /// An empty subset yields an empty histogram.
    pub fn ranged<D>(
        &self,
        subset: &Subset,
        dimension: D,
        reduction: &Reduction,
        layout: &RangedLayout,
    ) -> QueryResult<Histogram>
    where
        D: Fn(&Record) -> i64 + Sync,
    {
        let records = subset.records();
        if records.is_empty() {
            return Ok(Histogram::new());
        }

        let values = self.reduce_buckets(records.len(), layout.len(), reduction, |i| {
            let record: &Record = &records[i];
            (layout.bucket_of(dimension(record)), reduction.value(record))
        })?;

        debug!(
            records = records.len(),
            buckets = layout.len(),
            reduction = ?reduction,
            "Ranged histogram computed"
        );

        Ok(Histogram::from_distinct(
            layout.labels().iter().cloned().zip(values).collect(),
        ))
    }

    /// Bucket by a derived label
    ///
    /// `labeler` returns `None` for records whose label does not resolve;
    /// those go to the sentinel bucket, which is stripped from the result.
    pub fn discrete<'r, L>(
        &self,
        subset: &'r Subset,
        labeler: L,
        reduction: &Reduction,
        order: &KeyOrder,
    ) -> QueryResult<DiscreteHistogram>
    where
        L: Fn(&'r Record) -> Option<Cow<'r, str>> + Sync + Send,
    {
        let records = subset.records();
        if records.is_empty() {
            return Ok(DiscreteHistogram {
                histogram: Histogram::new(),
                unmapped_records: 0,
                unmapped_value: 0,
            });
        }

        // Pass 1: labels and key discovery
        let labels: Vec<Option<Cow<'r, str>>> = if self.parallel.should_parallelize(records.len()) {
            records
                .par_iter()
                .with_min_len(self.parallel.morsel_size)
                .map(|r| labeler(r.as_ref()))
                .collect()
        } else {
            records.iter().map(|r| labeler(r.as_ref())).collect()
        };
        let table = KeyTable::discover(labels.iter().map(|l| l.as_deref()), order);

        // Pass 2: bucketing
        let ids: Vec<usize> = labels.iter().map(|l| table.id_of(l.as_deref())).collect();
        let sentinel = table.sentinel();
        let unmapped_records = ids.iter().filter(|id| **id == sentinel).count();

        let mut values = self.reduce_buckets(records.len(), table.cardinality(), reduction, |i| {
            let record: &Record = &records[i];
            (ids[i], reduction.value(record))
        })?;
        let unmapped_value = values.pop().unwrap_or(0);

        debug!(
            records = records.len(),
            keys = table.keys().len(),
            unmapped = unmapped_records,
            reduction = ?reduction,
            "Discrete histogram computed"
        );

        Ok(DiscreteHistogram {
            histogram: Histogram::from_distinct(table.keys().iter().cloned().zip(values).collect()),
            unmapped_records,
            unmapped_value,
        })
    }

    /// Dispatch on the reduction to a monomorphized accumulation
    fn reduce_buckets<F>(
        &self,
        len: usize,
        buckets: usize,
        reduction: &Reduction,
        bucket_value: F,
    ) -> QueryResult<Vec<i64>>
    where
        F: Fn(usize) -> (usize, i64) + Sync,
    {
        match reduction.find_mode() {
            None => self.accumulate::<SumCell, _>(len, buckets, bucket_value),
            Some(FindMode::Max) => self.accumulate::<MaxCell, _>(len, buckets, bucket_value),
            Some(FindMode::Min) => self.accumulate::<MinCell, _>(len, buckets, bucket_value),
            Some(FindMode::Avg) => self.accumulate::<AvgCell, _>(len, buckets, bucket_value),
        }
    }

    fn accumulate<C, F>(&self, len: usize, buckets: usize, bucket_value: F) -> QueryResult<Vec<i64>>
    where
        C: BucketCell,
        F: Fn(usize) -> (usize, i64) + Sync,
    {
        let absorb = |mut shard: Vec<C>, i: usize| {
            let (bucket, value) = bucket_value(i);
            shard[bucket].add(value);
            shard
        };

        let cells: Vec<C> = if self.parallel.should_parallelize(len) {
            (0..len)
                .into_par_iter()
                .with_min_len(self.parallel.morsel_size)
                .fold(|| vec![C::default(); buckets], absorb)
                .reduce(
                    || vec![C::default(); buckets],
                    |mut left, right| {
                        for (l, r) in left.iter_mut().zip(right) {
                            l.merge(r);
                        }
                        left
                    },
                )
        } else {
            (0..len).fold(vec![C::default(); buckets], absorb)
        };

        cells.into_iter().map(BucketCell::finish).collect()
    }
}
