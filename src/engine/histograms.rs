//! Histogram entry points
//!
//! One method per dimension. Each takes the name of a sum aggregation and an
//! optional `"min|max|avg:field"` find spec; a non-empty find spec replaces
//! summation with extremum or average tracking.
//!
//! | Entry point | Layout | Dimension |
//! |-------------|--------|-----------|
//! | `diskspace_histogram` | `SPACE_SIZE` | bytes across replicas |
//! | `memory_histogram` | `MEMORY_SIZE` | estimated heap bytes |
//! | `file_size_histogram` | `SPACE_SIZE` | file length |
//! | `replication_histogram` | numeric keys | replication factor |
//! | `storage_type_histogram` | policy table | storage policy label |
//! | `access_time_histogram` | `TimeRange` | now − access time |
//! | `mod_time_histogram` | `TimeRange` | now − modification time |
//! | `owner_histogram` | discovered keys | user |
//! | `group_histogram` | discovered keys | group |
//! | `parent_dir_histogram` | discovered keys | ancestor directory at a depth |
//! | `file_type_histogram` | type table | extension class |
//! | `dir_quota_histogram` | discovered keys | directory path |

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::builder::QueryEngine;
use crate::aggregation::accumulate::{FindSpec, Reduction};
use crate::aggregation::data_model::Histogram;
use crate::aggregation::filetype;
use crate::aggregation::functions::Aggregation;
use crate::aggregation::layout::{KeyOrder, RangedLayout, TimeRange, MEMORY_SIZE, SPACE_SIZE};
use crate::query::catalog::LongFn;
use crate::query::error::QueryResult;
use crate::storage::Subset;
use crate::types::{EpochMillis, Record};

/// Transform name that replaces the diskspace histogram's dimension
pub const DISKSPACE_DIMENSION: &str = "diskspaceConsumed";

/// Transform name that replaces the replication histogram's dimension
pub const REPLICATION_DIMENSION: &str = "fileReplica";

/// Named long extractors overlaid on a histogram
///
/// A transform named after the histogram's dimension replaces how records
/// are bucketed; one named after the sum aggregation replaces what each
/// record contributes. Contribution overrides apply to sum mode only.
#[derive(Clone, Default)]
pub struct Transforms {
    overrides: HashMap<String, LongFn>,
}

impl Transforms {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an override
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Record) -> i64 + Send + Sync + 'static,
    {
        self.overrides.insert(name.into(), Arc::new(f));
        self
    }

    /// Override registered under `name`
    pub fn get(&self, name: &str) -> Option<&LongFn> {
        self.overrides.get(name)
    }

    /// Number of overrides
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// True if there are no overrides
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    fn or_default(&self, name: &str, default: LongFn) -> LongFn {
        match self.get(name) {
            Some(f) => {
                debug!(transform = name, "Function transformed");
                f.clone()
            },
            None => default,
        }
    }
}

impl fmt::Debug for Transforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.overrides.keys()).finish()
    }
}

impl QueryEngine {
    // =========================================================================
    // Ranged Histograms
    // =========================================================================

    /// Bytes consumed across replicas, in size ranges
    ///
    /// `transforms` may replace the dimension (`diskspaceConsumed`) and the
    /// contribution (named after `sum`).
    pub fn diskspace_histogram(
        &self,
        subset: &Subset,
        sum: &str,
        find: Option<&str>,
        transforms: &Transforms,
    ) -> QueryResult<Histogram> {
        let dimension = transforms.or_default(DISKSPACE_DIMENSION, Arc::new(Record::diskspace_consumed));
        self.ranged_histogram(
            "diskspace_histogram",
            subset,
            |r| dimension(r),
            sum,
            find,
            transforms,
            &SPACE_SIZE,
        )
    }

    /// Estimated heap footprint, in memory size ranges
    pub fn memory_histogram(&self, subset: &Subset, sum: &str, find: Option<&str>) -> QueryResult<Histogram> {
        self.ranged_histogram(
            "memory_histogram",
            subset,
            Record::memory_consumed,
            sum,
            find,
            &Transforms::default(),
            &MEMORY_SIZE,
        )
    }

    /// File length, in size ranges
    pub fn file_size_histogram(&self, subset: &Subset, sum: &str, find: Option<&str>) -> QueryResult<Histogram> {
        self.ranged_histogram(
            "file_size_histogram",
            subset,
            Record::file_size,
            sum,
            find,
            &Transforms::default(),
            &SPACE_SIZE,
        )
    }

    /// Time since last access, in `time_range` buckets
    pub fn access_time_histogram(
        &self,
        subset: &Subset,
        sum: &str,
        find: Option<&str>,
        time_range: &str,
    ) -> QueryResult<Histogram> {
        self.age_histogram("access_time_histogram", subset, sum, find, time_range, |r| r.access_time)
    }

    /// Time since last modification, in `time_range` buckets
    pub fn mod_time_histogram(
        &self,
        subset: &Subset,
        sum: &str,
        find: Option<&str>,
        time_range: &str,
    ) -> QueryResult<Histogram> {
        self.age_histogram("mod_time_histogram", subset, sum, find, time_range, |r| r.mod_time)
    }

    // =========================================================================
    // Discrete-key Histograms
    // =========================================================================

    /// Replication factor, ascending; buckets with a zero value are dropped
    ///
    /// `transforms` may replace the dimension (`fileReplica`) and the
    /// contribution (named after `sum`).
    pub fn replication_histogram(
        &self,
        subset: &Subset,
        sum: &str,
        find: Option<&str>,
        transforms: &Transforms,
    ) -> QueryResult<Histogram> {
        let dimension = transforms.or_default(REPLICATION_DIMENSION, Arc::new(Record::replication));
        let mut histogram = self.discrete_histogram(
            "replication_histogram",
            subset,
            |r| Some(Cow::Owned(dimension(r).to_string())),
            sum,
            find,
            transforms,
            &KeyOrder::Numeric,
        )?;
        histogram.retain(|_, v| *v != 0);
        Ok(histogram)
    }

    /// Storage policy, in the compatibility layer's canonical order
    ///
    /// Codes missing from the policy table are not exported.
    pub fn storage_type_histogram(&self, subset: &Subset, sum: &str, find: Option<&str>) -> QueryResult<Histogram> {
        let compat = self.catalog.compat();
        let policies = compat.storage_policies();
        let order = KeyOrder::Canonical(policies.iter().map(|(_, label)| label.to_string()).collect());

        self.discrete_histogram(
            "storage_type_histogram",
            subset,
            |r| {
                let code = compat.storage_policy(r);
                policies
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, label)| Cow::Borrowed(*label))
            },
            sum,
            find,
            &Transforms::default(),
            &order,
        )
    }

    /// Owner, in discovery order
    pub fn owner_histogram(&self, subset: &Subset, sum: &str, find: Option<&str>) -> QueryResult<Histogram> {
        self.discrete_histogram(
            "owner_histogram",
            subset,
            |r| Some(Cow::Borrowed(r.user.as_str())),
            sum,
            find,
            &Transforms::default(),
            &KeyOrder::Discovery,
        )
    }

    /// Group, in discovery order
    pub fn group_histogram(&self, subset: &Subset, sum: &str, find: Option<&str>) -> QueryResult<Histogram> {
        self.discrete_histogram(
            "group_histogram",
            subset,
            |r| Some(Cow::Borrowed(r.group.as_str())),
            sum,
            find,
            &Transforms::default(),
            &KeyOrder::Discovery,
        )
    }

    /// Ancestor directory at `depth` (root = 0), in discovery order
    ///
    /// Depth 0 buckets every non-root record under `/`. A negative depth
    /// maps nothing, so the result is empty. Records whose parent is
    /// shallower than `depth` are not exported.
    pub fn parent_dir_histogram(
        &self,
        subset: &Subset,
        depth: i64,
        sum: &str,
        find: Option<&str>,
    ) -> QueryResult<Histogram> {
        self.discrete_histogram(
            "parent_dir_histogram",
            subset,
            |r| {
                let depth = usize::try_from(depth).ok()?;
                r.ancestor_at_depth(depth).map(Cow::Borrowed)
            },
            sum,
            find,
            &Transforms::default(),
            &KeyOrder::Discovery,
        )
    }

    /// File type by extension, in type table order
    ///
    /// Only buckets with a positive value are exported; directories are
    /// never bucketed.
    pub fn file_type_histogram(&self, subset: &Subset, sum: &str, find: Option<&str>) -> QueryResult<Histogram> {
        let mut histogram = self.discrete_histogram(
            "file_type_histogram",
            subset,
            |r| filetype::file_type(r).map(Cow::Borrowed),
            sum,
            find,
            &Transforms::default(),
            &KeyOrder::Canonical(filetype::labels()),
        )?;
        histogram.retain(|_, v| *v > 0);
        Ok(histogram)
    }

    /// Directory by full path, in discovery order
    ///
    /// Files are never bucketed; buckets with a negative value are dropped.
    pub fn dir_quota_histogram(&self, subset: &Subset, sum: &str, find: Option<&str>) -> QueryResult<Histogram> {
        let mut histogram = self.discrete_histogram(
            "dir_quota_histogram",
            subset,
            |r| r.is_dir().then(|| Cow::Borrowed(r.path.as_str())),
            sum,
            find,
            &Transforms::default(),
            &KeyOrder::Discovery,
        )?;
        histogram.retain(|_, v| *v >= 0);
        Ok(histogram)
    }

    // =========================================================================
    // Shared plumbing
    // =========================================================================

    /// Sum aggregation or find spec, with contribution overrides
    fn reduction(&self, sum: &str, find: Option<&str>, transforms: &Transforms) -> QueryResult<Reduction> {
        if let Some(find) = find.map(str::trim).filter(|f| !f.is_empty()) {
            return Ok(Reduction::Find(FindSpec::parse(&self.catalog, find)?));
        }

        let aggregation = Aggregation::parse(sum)?;
        Ok(match transforms.get(sum) {
            Some(contribution) => {
                debug!(transform = sum, "Function transformed");
                Reduction::Sum(contribution.clone())
            },
            None => Reduction::sum(aggregation),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn ranged_histogram<D>(
        &self,
        operation: &'static str,
        subset: &Subset,
        dimension: D,
        sum: &str,
        find: Option<&str>,
        transforms: &Transforms,
        layout: &RangedLayout,
    ) -> QueryResult<Histogram>
    where
        D: Fn(&Record) -> i64 + Sync,
    {
        self.observe(operation, subset.len(), || {
            let reduction = self.reduction(sum, find, transforms)?;
            self.histograms.ranged(subset, dimension, &reduction, layout)
        })
    }

    fn age_histogram(
        &self,
        operation: &'static str,
        subset: &Subset,
        sum: &str,
        find: Option<&str>,
        time_range: &str,
        time: fn(&Record) -> EpochMillis,
    ) -> QueryResult<Histogram> {
        self.observe(operation, subset.len(), || {
            let range: TimeRange = time_range.parse()?;
            let reduction = self.reduction(sum, find, &Transforms::default())?;
            let now = self.now();
            self.histograms.ranged(
                subset,
                |r| now.saturating_sub(time(r)),
                &reduction,
                range.layout(),
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn discrete_histogram<'r, L>(
        &self,
        operation: &'static str,
        subset: &'r Subset,
        labeler: L,
        sum: &str,
        find: Option<&str>,
        transforms: &Transforms,
        order: &KeyOrder,
    ) -> QueryResult<Histogram>
    where
        L: Fn(&'r Record) -> Option<Cow<'r, str>> + Sync + Send,
    {
        self.observe(operation, subset.len(), || {
            let reduction = self.reduction(sum, find, transforms)?;
            let result = self.histograms.discrete(subset, labeler, &reduction, order)?;
            if result.unmapped_records > 0 {
                debug!(
                    operation,
                    unmapped = result.unmapped_records,
                    unmapped_value = result.unmapped_value,
                    "Records without a bucket"
                );
            }
            Ok(result.histogram)
        })
    }
}
