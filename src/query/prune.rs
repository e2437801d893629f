//! Conditional bucket pruning
//!
//! Removes histogram buckets whose value fails a conjunction of long
//! comparisons, reusing the long operator table of the filter compiler.
//!
//! - Scalar histograms take `"op:operand;op:operand"`.
//! - Vector-valued histograms take `"index:op:operand,index:op:operand"`,
//!   where `index` selects the element of each bucket's vector.
//!
//! Empty segments are ignored, so an empty spec keeps every bucket.

use std::time::Instant;

use tracing::info;

use crate::aggregation::data_model::Histogram;
use crate::metrics;
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::{split_spec, LongComparison};
use crate::types::EpochMillis;

/// Conjunction of long comparisons over a scalar bucket value
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    comparisons: Vec<LongComparison>,
}

impl Conditions {
    /// Parse a `;`-separated condition list
    pub fn parse(spec: &str, now: EpochMillis) -> QueryResult<Self> {
        let comparisons = spec
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|condition| LongComparison::parse("condition", condition, now))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self { comparisons })
    }

    /// True if every comparison holds
    pub fn check(&self, value: i64) -> bool {
        self.comparisons.iter().all(|c| c.test(value))
    }

    /// Number of comparisons
    pub fn len(&self) -> usize {
        self.comparisons.len()
    }

    /// True if there are no comparisons
    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }
}

/// Conjunction of long comparisons over elements of a vector bucket value
#[derive(Debug, Clone, Default)]
pub struct IndexedConditions {
    comparisons: Vec<(usize, LongComparison)>,
}

impl IndexedConditions {
    /// Parse a `,`-separated list of `index:op:operand` triplets
    pub fn parse(spec: &str, now: EpochMillis) -> QueryResult<Self> {
        let comparisons = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|triplet| {
                let (index, condition) = split_spec("condition", triplet)?;
                let index = index.parse::<usize>().map_err(|e| {
                    QueryError::malformed("condition index", index, e.to_string())
                })?;
                Ok((index, LongComparison::parse("condition", condition, now)?))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self { comparisons })
    }

    /// True if every comparison holds; an index past the end of `values` is an error
    pub fn check(&self, values: &[i64]) -> QueryResult<bool> {
        for (index, comparison) in &self.comparisons {
            let value = values.get(*index).ok_or_else(|| {
                QueryError::malformed(
                    "condition index",
                    index.to_string(),
                    format!("bucket holds {} values", values.len()),
                )
            })?;
            if !comparison.test(*value) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Keep the buckets whose value satisfies every condition in `spec`
pub fn remove_keys_on_conditional(
    mut histogram: Histogram,
    spec: &str,
    now: EpochMillis,
) -> QueryResult<Histogram> {
    let start = Instant::now();
    let conditions = Conditions::parse(spec, now)?;
    let original = histogram.len();

    histogram.retain(|_, value| conditions.check(*value));

    info!(
        removed = original - histogram.len(),
        original = original,
        conditions = spec,
        elapsed_ms = metrics::elapsed_ms(start.elapsed()),
        "Pruned histogram"
    );
    Ok(histogram)
}

/// Keep the vector-valued buckets that satisfy every indexed condition in `spec`
pub fn remove_keys_on_conditional_vec(
    mut histogram: Histogram<Vec<i64>>,
    spec: &str,
    now: EpochMillis,
) -> QueryResult<Histogram<Vec<i64>>> {
    let start = Instant::now();
    let conditions = IndexedConditions::parse(spec, now)?;
    let original = histogram.len();

    // Check every bucket before removing any, so a bad index leaves no partial result
    let keep = histogram
        .iter()
        .map(|(_, values)| conditions.check(values))
        .collect::<QueryResult<Vec<bool>>>()?;
    let mut keep = keep.into_iter();
    histogram.retain(|_, _| keep.next().unwrap_or(true));

    info!(
        removed = original - histogram.len(),
        original = original,
        conditions = spec,
        elapsed_ms = metrics::elapsed_ms(start.elapsed()),
        "Pruned vector histogram"
    );
    Ok(histogram)
}
