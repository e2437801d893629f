//! Per-bucket reduction
//!
//! A histogram reduces each bucket either by summing a contribution or by
//! tracking an extremum or average of a long attribute ("find" mode). Each
//! reduction is a `BucketCell`: a value that absorbs record values and merges
//! with a partial cell from another worker. Merging is associative and
//! commutative, so per-worker shards can be combined in any order.
//!
//! Every find mode exports `EMPTY_BUCKET_DEFAULT` for a bucket that saw no
//! records.

use std::fmt;

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::aggregation::functions::Aggregation;
use crate::query::catalog::{AttributeCatalog, LongFn};
use crate::query::error::{join_valid, QueryError, QueryResult};
use crate::query::filter::split_spec;
use crate::types::Record;

/// Value exported by a find-mode bucket with no records
pub const EMPTY_BUCKET_DEFAULT: i64 = 0;

// ============================================================================
// Find specs
// ============================================================================

/// Extremum or average tracked per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMode {
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// Floor of the mean
    Avg,
}

impl FindMode {
    /// Every find mode name
    pub const NAMES: &'static [&'static str] = &["min", "max", "avg"];

    /// Look up a mode by name
    pub fn parse(name: &str) -> QueryResult<Self> {
        match name {
            "min" => Ok(FindMode::Min),
            "max" => Ok(FindMode::Max),
            "avg" => Ok(FindMode::Avg),
            _ => Err(QueryError::UnknownFindMode {
                mode: name.to_string(),
                valid: join_valid(Self::NAMES),
            }),
        }
    }

    /// Name used by callers
    pub fn name(self) -> &'static str {
        match self {
            FindMode::Min => "min",
            FindMode::Max => "max",
            FindMode::Avg => "avg",
        }
    }
}

/// A parsed `"mode:field"` find spec
#[derive(Clone)]
pub struct FindSpec {
    mode: FindMode,
    field: String,
    extract: LongFn,
}

impl FindSpec {
    /// Parse `"min|max|avg:field"`; `field` must be a long attribute
    pub fn parse(catalog: &AttributeCatalog, spec: &str) -> QueryResult<Self> {
        let (mode, field) = split_spec("find", spec)?;
        let mode = FindMode::parse(mode)?;
        let extract = catalog.resolve_long(field, mode.name())?;
        Ok(Self {
            mode,
            field: field.to_string(),
            extract,
        })
    }

    /// Find mode
    pub fn mode(&self) -> FindMode {
        self.mode
    }

    /// Attribute the mode is applied to
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Value of the attribute for a record
    #[inline]
    pub fn value(&self, record: &Record) -> i64 {
        (self.extract)(record)
    }
}

impl fmt::Debug for FindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode.name(), self.field)
    }
}

/// How a histogram reduces each bucket
#[derive(Clone)]
pub enum Reduction {
    /// Add each record's contribution
    Sum(LongFn),
    /// Track an extremum or average of an attribute
    Find(FindSpec),
}

impl Reduction {
    /// Sum of a named aggregation's contribution
    pub fn sum(aggregation: Aggregation) -> Self {
        Reduction::Sum(aggregation.extractor())
    }

    /// Value a record feeds into its bucket
    #[inline]
    pub fn value(&self, record: &Record) -> i64 {
        match self {
            Reduction::Sum(contribution) => contribution(record),
            Reduction::Find(spec) => spec.value(record),
        }
    }

    /// Find mode, if any
    pub fn find_mode(&self) -> Option<FindMode> {
        match self {
            Reduction::Sum(_) => None,
            Reduction::Find(spec) => Some(spec.mode()),
        }
    }
}

impl fmt::Debug for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Sum(_) => write!(f, "Sum"),
            Reduction::Find(spec) => write!(f, "Find({spec:?})"),
        }
    }
}

// ============================================================================
// Bucket cells
// ============================================================================

/// Accumulator for one bucket
pub trait BucketCell: Clone + Default + Send + Sync {
    /// Absorb a record value
    fn add(&mut self, value: i64);

    /// Absorb a partial cell from another worker
    fn merge(&mut self, other: Self);

    /// Exported bucket value
    fn finish(self) -> QueryResult<i64>;
}

/// Running sum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SumCell(i64);

impl BucketCell for SumCell {
    #[inline]
    fn add(&mut self, value: i64) {
        self.0 = self.0.saturating_add(value);
    }

    fn merge(&mut self, other: Self) {
        self.add(other.0);
    }

    fn finish(self) -> QueryResult<i64> {
        Ok(self.0)
    }
}

/// Largest value seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxCell(Option<i64>);

impl BucketCell for MaxCell {
    #[inline]
    fn add(&mut self, value: i64) {
        self.0 = Some(self.0.map_or(value, |cur| cur.max(value)));
    }

    fn merge(&mut self, other: Self) {
        if let Some(value) = other.0 {
            self.add(value);
        }
    }

    fn finish(self) -> QueryResult<i64> {
        Ok(self.0.unwrap_or(EMPTY_BUCKET_DEFAULT))
    }
}

/// Smallest value seen; the first value is taken unconditionally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinCell(Option<i64>);

impl BucketCell for MinCell {
    #[inline]
    fn add(&mut self, value: i64) {
        self.0 = Some(self.0.map_or(value, |cur| cur.min(value)));
    }

    fn merge(&mut self, other: Self) {
        if let Some(value) = other.0 {
            self.add(value);
        }
    }

    fn finish(self) -> QueryResult<i64> {
        Ok(self.0.unwrap_or(EMPTY_BUCKET_DEFAULT))
    }
}

/// Arbitrary-precision sum and count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvgCell {
    sum: BigInt,
    count: u64,
}

impl BucketCell for AvgCell {
    #[inline]
    fn add(&mut self, value: i64) {
        self.sum += value;
        self.count += 1;
    }

    fn merge(&mut self, other: Self) {
        self.sum += other.sum;
        self.count += other.count;
    }

    fn finish(self) -> QueryResult<i64> {
        if self.count == 0 {
            return Ok(EMPTY_BUCKET_DEFAULT);
        }
        let mean = floor_div(&self.sum, self.count);
        mean.to_i64()
            .ok_or_else(|| QueryError::invariant(format!("average {mean} does not fit in i64")))
    }
}

/// Integer division rounding toward negative infinity
fn floor_div(sum: &BigInt, count: u64) -> BigInt {
    let divisor = BigInt::from(count);
    let quotient = sum / &divisor;
    if sum.is_negative() && !(sum % &divisor).is_zero() {
        quotient - BigInt::one()
    } else {
        quotient
    }
}
