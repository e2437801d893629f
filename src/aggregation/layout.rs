//! Bucket layouts
//!
//! Two ways of turning a record into a bucket index:
//!
//! - **`RangedLayout`**: ascending upper-bound thresholds plus one implicit
//!   overflow bucket. A value lands in the first bucket whose threshold is
//!   greater than or equal to it, found by binary search.
//! - **`KeyTable`**: dense ids for the distinct labels observed in a subset,
//!   plus a trailing `NO_MAPPING` sentinel id for records whose label does
//!   not resolve. The sentinel bucket is never exported.
//!
//! The predefined boundary tables live here as data; the engine code that
//! consumes them is layout-agnostic.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::query::error::{join_valid, QueryError, QueryResult};

const KB: i64 = 1024;
const MB: i64 = 1024 * KB;
const GB: i64 = 1024 * MB;
const TB: i64 = 1024 * GB;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;
const MONTH_MS: i64 = 30 * DAY_MS;
const YEAR_MS: i64 = 365 * DAY_MS;

/// Label of the discrete-key sentinel bucket
pub const NO_MAPPING: &str = "NO_MAPPING";

// ============================================================================
// Ranged layout
// ============================================================================

/// Fixed, non-uniform range buckets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangedLayout {
    thresholds: Vec<i64>,
    labels: Vec<String>,
}

impl RangedLayout {
    /// Create a layout
    ///
    /// `thresholds` must be strictly ascending and `labels` must hold one
    /// label per threshold plus the overflow label.
    pub fn new<S: Into<String>>(thresholds: Vec<i64>, labels: Vec<S>) -> QueryResult<Self> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() != thresholds.len() + 1 {
            return Err(QueryError::malformed(
                "layout",
                format!("{} thresholds, {} labels", thresholds.len(), labels.len()),
                "expected one label per threshold plus an overflow label",
            ));
        }
        if let Some(pair) = thresholds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(QueryError::malformed(
                "layout",
                format!("{} >= {}", pair[0], pair[1]),
                "thresholds must be strictly ascending",
            ));
        }
        Ok(Self { thresholds, labels })
    }

    fn predefined(thresholds: &[i64], labels: &[&str]) -> Self {
        debug_assert_eq!(labels.len(), thresholds.len() + 1);
        Self {
            thresholds: thresholds.to_vec(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Index of the bucket `value` falls in
    #[inline]
    pub fn bucket_of(&self, value: i64) -> usize {
        self.thresholds.partition_point(|t| *t < value)
    }

    /// Number of buckets, overflow included
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false; a layout has at least the overflow bucket
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Upper bounds
    pub fn thresholds(&self) -> &[i64] {
        &self.thresholds
    }

    /// Bucket labels, overflow last
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// File and disk usage in bytes
pub static SPACE_SIZE: Lazy<RangedLayout> = Lazy::new(|| {
    RangedLayout::predefined(
        &[0, KB, MB, 32 * MB, 64 * MB, 128 * MB, 256 * MB, 512 * MB, GB, 10 * GB, 100 * GB, TB],
        &[
            "0B", "1KB", "1MB", "32MB", "64MB", "128MB", "256MB", "512MB", "1GB", "10GB", "100GB",
            "1TB", ">1TB",
        ],
    )
});

/// Namespace heap footprint in bytes
pub static MEMORY_SIZE: Lazy<RangedLayout> = Lazy::new(|| {
    RangedLayout::predefined(
        &[0, 100, KB, 10 * KB, 100 * KB, MB, 10 * MB, 100 * MB, GB],
        &["0B", "100B", "1KB", "10KB", "100KB", "1MB", "10MB", "100MB", "1GB", ">1GB"],
    )
});

static HOURS: Lazy<RangedLayout> = Lazy::new(|| {
    RangedLayout::predefined(
        &[HOUR_MS, 2 * HOUR_MS, 4 * HOUR_MS, 8 * HOUR_MS, 12 * HOUR_MS, 24 * HOUR_MS],
        &["0-1h", "1-2h", "2-4h", "4-8h", "8-12h", "12-24h", ">24h"],
    )
});

static DAYS: Lazy<RangedLayout> = Lazy::new(|| {
    RangedLayout::predefined(
        &[DAY_MS, 2 * DAY_MS, 3 * DAY_MS, 7 * DAY_MS, 14 * DAY_MS, 30 * DAY_MS],
        &["0-1d", "1-2d", "2-3d", "3-7d", "7-14d", "14-30d", ">30d"],
    )
});

static WEEKS: Lazy<RangedLayout> = Lazy::new(|| {
    RangedLayout::predefined(
        &[WEEK_MS, 2 * WEEK_MS, 3 * WEEK_MS, 4 * WEEK_MS, 8 * WEEK_MS, 12 * WEEK_MS],
        &["0-1w", "1-2w", "2-3w", "3-4w", "4-8w", "8-12w", ">12w"],
    )
});

static MONTHS: Lazy<RangedLayout> = Lazy::new(|| {
    RangedLayout::predefined(
        &[MONTH_MS, 3 * MONTH_MS, 6 * MONTH_MS, 9 * MONTH_MS, 12 * MONTH_MS, 18 * MONTH_MS, 24 * MONTH_MS],
        &["0-1m", "1-3m", "3-6m", "6-9m", "9-12m", "12-18m", "18-24m", ">24m"],
    )
});

static YEARS: Lazy<RangedLayout> = Lazy::new(|| {
    RangedLayout::predefined(
        &[YEAR_MS, 2 * YEAR_MS, 3 * YEAR_MS, 4 * YEAR_MS, 5 * YEAR_MS, 10 * YEAR_MS],
        &["0-1y", "1-2y", "2-3y", "3-4y", "4-5y", "5-10y", ">10y"],
    )
});

/// Granularity of an age histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    /// Up to a day, hour buckets
    Hours,
    /// Up to a month, day buckets
    Days,
    /// Up to a quarter, week buckets
    Weeks,
    /// Up to two years, month buckets (30 days)
    #[default]
    Months,
    /// Up to a decade, year buckets (365 days)
    Years,
}

impl TimeRange {
    /// Every range name
    pub const NAMES: &'static [&'static str] = &["hours", "days", "weeks", "months", "years"];

    /// Layout for this range; values are ages in milliseconds
    pub fn layout(self) -> &'static RangedLayout {
        match self {
            TimeRange::Hours => &HOURS,
            TimeRange::Days => &DAYS,
            TimeRange::Weeks => &WEEKS,
            TimeRange::Months => &MONTHS,
            TimeRange::Years => &YEARS,
        }
    }

    /// Name used by callers
    pub fn name(self) -> &'static str {
        match self {
            TimeRange::Hours => "hours",
            TimeRange::Days => "days",
            TimeRange::Weeks => "weeks",
            TimeRange::Months => "months",
            TimeRange::Years => "years",
        }
    }
}

impl FromStr for TimeRange {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hours" => Ok(TimeRange::Hours),
            "days" => Ok(TimeRange::Days),
            "weeks" => Ok(TimeRange::Weeks),
            "months" => Ok(TimeRange::Months),
            "years" => Ok(TimeRange::Years),
            _ => Err(QueryError::malformed(
                "timeRange",
                s,
                format!("expected one of {}", join_valid(Self::NAMES)),
            )),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Discrete-key layout
// ============================================================================

/// Order in which discovered keys are exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrder {
    /// First appearance in the subset
    Discovery,
    /// Ascending by the key's integer value; non-numeric keys follow in discovery order
    Numeric,
    /// Position in a fixed key list; labels outside the list map to the sentinel
    Canonical(Vec<String>),
}

/// Dense ids for distinct labels, plus the `NO_MAPPING` sentinel
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: Vec<String>,
    ids: HashMap<String, usize>,
}

impl KeyTable {
    /// Assign ids to the distinct labels in `labels`
    ///
    /// `None` marks a record whose label did not resolve; it is routed to the
    /// sentinel and never becomes a key.
    pub fn discover<'a, I>(labels: I, order: &KeyOrder) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut seen: HashMap<&'a str, usize> = HashMap::new();
        let mut keys: Vec<&'a str> = Vec::new();
        for label in labels.into_iter().flatten() {
            seen.entry(label).or_insert_with(|| {
                keys.push(label);
                keys.len() - 1
            });
        }

        match order {
            KeyOrder::Discovery => {},
            KeyOrder::Numeric => {
                // Stable sort keeps discovery order among non-numeric keys
                keys.sort_by_key(|k| match k.parse::<i64>() {
                    Ok(n) => (0, n),
                    Err(_) => (1, 0),
                });
            },
            KeyOrder::Canonical(canonical) => {
                let rank: HashMap<&str, usize> = canonical
                    .iter()
                    .enumerate()
                    .map(|(i, k)| (k.as_str(), i))
                    .collect();
                keys.retain(|k| rank.contains_key(k));
                keys.sort_by_key(|k| rank.get(k).copied().unwrap_or(usize::MAX));
            },
        }

        Self::from_keys(keys)
    }

    /// Build a table over a fixed key list, in list order
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for key in keys {
            let key = key.into();
            if !table.ids.contains_key(&key) {
                table.ids.insert(key.clone(), table.keys.len());
                table.keys.push(key);
            }
        }
        table
    }

    /// Id for a label; unresolved or unknown labels get the sentinel
    #[inline]
    pub fn id_of(&self, label: Option<&str>) -> usize {
        label
            .and_then(|l| self.ids.get(l).copied())
            .unwrap_or_else(|| self.sentinel())
    }

    /// Id of the `NO_MAPPING` bucket
    #[inline]
    pub fn sentinel(&self) -> usize {
        self.keys.len()
    }

    /// Number of buckets, sentinel included
    pub fn cardinality(&self) -> usize {
        self.keys.len() + 1
    }

    /// Keys in id order, sentinel excluded
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}
