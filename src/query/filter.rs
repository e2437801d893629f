//! Filter compilation
//!
//! Turns caller-supplied `(field, "operator:operand")` pairs into typed
//! predicates. Each value kind has its own closed operator enum, so the set of
//! operators a kind accepts is checked exhaustively at compile time and an
//! operator that does not belong to a kind is rejected with a named error.
//!
//! # Operators
//!
//! | Kind | Operators |
//! |------|-----------|
//! | long | `eq notEq gt gte lt lte`, `minutesAgo hoursAgo daysAgo monthsAgo yearsAgo`, `olderThanMinutes olderThanHours olderThanDays olderThanMonths olderThanYears` |
//! | string | `eq notEq startsWith notStartsWith endsWith notEndsWith contains notContains` |
//! | boolean | `eq notEq` |
//! | date | `dateEq dateNotEq dateLt dateLte dateStart dateGt dateGte dateEnd` |
//!
//! Relative-time operators compare against "now" read from the engine clock
//! when the predicate is compiled. A month is 30 days and a year 365 days.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use namespace_query::engine::traits::{DefaultCompat, FixedClock};
//! use namespace_query::query::catalog::AttributeCatalog;
//! use namespace_query::query::filter::FilterCompiler;
//! use namespace_query::types::{FileAttrs, Record};
//!
//! let catalog = Arc::new(AttributeCatalog::new(Arc::new(DefaultCompat)));
//! let compiler = FilterCompiler::new(catalog, Arc::new(FixedClock(0)));
//!
//! let predicate = compiler
//!     .compile_all(&["fileSize", "user"], &["gte:1024", "eq:hdfs"])
//!     .unwrap();
//!
//! let big = Record::file(1, "/a", FileAttrs::new(4096, 3, 128)).with_owner("hdfs", "hadoop");
//! let small = Record::file(2, "/b", FileAttrs::new(10, 3, 128)).with_owner("hdfs", "hadoop");
//! assert!(predicate.matches(&big).unwrap());
//! assert!(!predicate.matches(&small).unwrap());
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::engine::traits::Clock;
use crate::query::catalog::{AttributeCatalog, BoolFn, DateFn, Extractor, LongFn, StrFn};
use crate::query::error::{join_valid, QueryError, QueryResult, ValueKind};
use crate::types::{parse_day, EpochMillis, Record};

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Split an `"operator:operand"` spec on its first `:`
pub fn split_spec<'a>(context: &str, spec: &'a str) -> QueryResult<(&'a str, &'a str)> {
    spec.split_once(':').ok_or_else(|| {
        QueryError::malformed(context, spec, "expected 'operator:operand'")
    })
}

// ============================================================================
// Operator tables
// ============================================================================

/// Unit of a relative-time operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// 60 seconds
    Minutes,
    /// 60 minutes
    Hours,
    /// 24 hours
    Days,
    /// 30 days
    Months,
    /// 365 days
    Years,
}

impl TimeUnit {
    /// Length of one unit in milliseconds
    pub fn millis(self) -> i64 {
        match self {
            TimeUnit::Minutes => MINUTE_MS,
            TimeUnit::Hours => HOUR_MS,
            TimeUnit::Days => DAY_MS,
            TimeUnit::Months => 30 * DAY_MS,
            TimeUnit::Years => 365 * DAY_MS,
        }
    }
}

/// Operators over long attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongOp {
    /// value == operand
    Eq,
    /// value != operand
    NotEq,
    /// value > operand
    Gt,
    /// value >= operand
    Gte,
    /// value < operand
    Lt,
    /// value <= operand
    Lte,
    /// value >= now - operand * unit
    Within(TimeUnit),
    /// value <= now - operand * unit
    OlderThan(TimeUnit),
}

impl LongOp {
    /// Every long operator name
    pub const NAMES: &'static [&'static str] = &[
        "eq",
        "notEq",
        "gt",
        "gte",
        "lt",
        "lte",
        "minutesAgo",
        "hoursAgo",
        "daysAgo",
        "monthsAgo",
        "yearsAgo",
        "olderThanMinutes",
        "olderThanHours",
        "olderThanDays",
        "olderThanMonths",
        "olderThanYears",
    ];

    /// Look up an operator by name
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name {
            "eq" => LongOp::Eq,
            "notEq" => LongOp::NotEq,
            "gt" => LongOp::Gt,
            "gte" => LongOp::Gte,
            "lt" => LongOp::Lt,
            "lte" => LongOp::Lte,
            "minutesAgo" => LongOp::Within(TimeUnit::Minutes),
            "hoursAgo" => LongOp::Within(TimeUnit::Hours),
            "daysAgo" => LongOp::Within(TimeUnit::Days),
            "monthsAgo" => LongOp::Within(TimeUnit::Months),
            "yearsAgo" => LongOp::Within(TimeUnit::Years),
            "olderThanMinutes" => LongOp::OlderThan(TimeUnit::Minutes),
            "olderThanHours" => LongOp::OlderThan(TimeUnit::Hours),
            "olderThanDays" => LongOp::OlderThan(TimeUnit::Days),
            "olderThanMonths" => LongOp::OlderThan(TimeUnit::Months),
            "olderThanYears" => LongOp::OlderThan(TimeUnit::Years),
            _ => return None,
        };
        Some(op)
    }
}

/// Operators over string attributes; all byte-exact and case-sensitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    /// Equal
    Eq,
    /// Not equal
    NotEq,
    /// Has prefix
    StartsWith,
    /// Lacks prefix
    NotStartsWith,
    /// Has suffix
    EndsWith,
    /// Lacks suffix
    NotEndsWith,
    /// Has substring
    Contains,
    /// Lacks substring
    NotContains,
}

impl StringOp {
    /// Every string operator name
    pub const NAMES: &'static [&'static str] = &[
        "eq",
        "notEq",
        "startsWith",
        "notStartsWith",
        "endsWith",
        "notEndsWith",
        "contains",
        "notContains",
    ];

    /// Look up an operator by name
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name {
            "eq" => StringOp::Eq,
            "notEq" => StringOp::NotEq,
            "startsWith" => StringOp::StartsWith,
            "notStartsWith" => StringOp::NotStartsWith,
            "endsWith" => StringOp::EndsWith,
            "notEndsWith" => StringOp::NotEndsWith,
            "contains" => StringOp::Contains,
            "notContains" => StringOp::NotContains,
            _ => return None,
        };
        Some(op)
    }

    /// Apply the operator
    pub fn test(self, value: &str, operand: &str) -> bool {
        match self {
            StringOp::Eq => value == operand,
            StringOp::NotEq => value != operand,
            StringOp::StartsWith => value.starts_with(operand),
            StringOp::NotStartsWith => !value.starts_with(operand),
            StringOp::EndsWith => value.ends_with(operand),
            StringOp::NotEndsWith => !value.ends_with(operand),
            StringOp::Contains => value.contains(operand),
            StringOp::NotContains => !value.contains(operand),
        }
    }
}

/// Operators over boolean attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// Equal
    Eq,
    /// Not equal
    NotEq,
}

impl BoolOp {
    /// Every boolean operator name
    pub const NAMES: &'static [&'static str] = &["eq", "notEq"];

    /// Look up an operator by name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(BoolOp::Eq),
            "notEq" => Some(BoolOp::NotEq),
            _ => None,
        }
    }
}

/// Operators over day-truncated dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOp {
    /// Same day
    Eq,
    /// Different day
    NotEq,
    /// Strictly before
    Lt,
    /// On or before (`dateLte`, `dateStart`)
    Lte,
    /// Strictly after
    Gt,
    /// On or after (`dateGte`, `dateEnd`)
    Gte,
}

impl DateOp {
    /// Every date operator name, aliases included
    pub const NAMES: &'static [&'static str] = &[
        "dateEq",
        "dateNotEq",
        "dateLt",
        "dateLte",
        "dateStart",
        "dateGt",
        "dateGte",
        "dateEnd",
    ];

    /// Look up an operator by name
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name {
            "dateEq" => DateOp::Eq,
            "dateNotEq" => DateOp::NotEq,
            "dateLt" => DateOp::Lt,
            "dateLte" | "dateStart" => DateOp::Lte,
            "dateGt" => DateOp::Gt,
            "dateGte" | "dateEnd" => DateOp::Gte,
            _ => return None,
        };
        Some(op)
    }

    /// Apply the operator
    pub fn test(self, value: NaiveDate, operand: NaiveDate) -> bool {
        match self {
            DateOp::Eq => value == operand,
            DateOp::NotEq => value != operand,
            DateOp::Lt => value < operand,
            DateOp::Lte => value <= operand,
            DateOp::Gt => value > operand,
            DateOp::Gte => value >= operand,
        }
    }
}

// ============================================================================
// Long comparison
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A compiled long comparison
///
/// Relative-time operators are resolved against `now` up front, so testing a
/// value is a single integer comparison. Shared by the filter compiler and
/// the bucket pruner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongComparison {
    op: LongOp,
    operand: i64,
    cmp: Cmp,
    threshold: i64,
}

impl LongComparison {
    /// Build a comparison from an operator and a parsed operand
    pub fn new(op: LongOp, operand: i64, now: EpochMillis) -> Self {
        let (cmp, threshold) = match op {
            LongOp::Eq => (Cmp::Eq, operand),
            LongOp::NotEq => (Cmp::NotEq, operand),
            LongOp::Gt => (Cmp::Gt, operand),
            LongOp::Gte => (Cmp::Gte, operand),
            LongOp::Lt => (Cmp::Lt, operand),
            LongOp::Lte => (Cmp::Lte, operand),
            LongOp::Within(unit) => (Cmp::Gte, now.saturating_sub(operand.saturating_mul(unit.millis()))),
            LongOp::OlderThan(unit) => (Cmp::Lte, now.saturating_sub(operand.saturating_mul(unit.millis()))),
        };
        Self {
            op,
            operand,
            cmp,
            threshold,
        }
    }

    /// Parse an `"operator:operand"` spec
    ///
    /// `context` names the field or condition for error messages.
    pub fn parse(context: &str, spec: &str, now: EpochMillis) -> QueryResult<Self> {
        let (op_name, operand) = split_spec(context, spec)?;
        Self::compile(context, op_name, operand, now)
    }

    /// Build from an operator name and raw operand
    pub fn compile(context: &str, op_name: &str, operand: &str, now: EpochMillis) -> QueryResult<Self> {
        let op = LongOp::parse(op_name).ok_or_else(|| QueryError::UnsupportedOperator {
            field: context.to_string(),
            operator: op_name.to_string(),
            kind: ValueKind::Long,
            valid: join_valid(LongOp::NAMES),
        })?;
        let value = operand.parse::<i64>().map_err(|e| {
            QueryError::malformed(format!("{context}:{op_name}"), operand, e.to_string())
        })?;
        Ok(Self::new(op, value, now))
    }

    /// Test a value
    #[inline]
    pub fn test(&self, value: i64) -> bool {
        match self.cmp {
            Cmp::Eq => value == self.threshold,
            Cmp::NotEq => value != self.threshold,
            Cmp::Gt => value > self.threshold,
            Cmp::Gte => value >= self.threshold,
            Cmp::Lt => value < self.threshold,
            Cmp::Lte => value <= self.threshold,
        }
    }

    /// Operator as written
    pub fn op(&self) -> LongOp {
        self.op
    }

    /// Operand as written
    pub fn operand(&self) -> i64 {
        self.operand
    }
}

// ============================================================================
// Predicate
// ============================================================================

/// A compiled record predicate
#[derive(Clone)]
pub enum Predicate {
    /// Accepts every record
    Always,
    /// Long attribute comparison
    Long {
        /// Attribute name
        field: &'static str,
        /// Extractor
        extract: LongFn,
        /// Comparison
        cmp: LongComparison,
    },
    /// String attribute comparison
    Str {
        /// Attribute name
        field: &'static str,
        /// Extractor
        extract: StrFn,
        /// Operator
        op: StringOp,
        /// Operand
        operand: String,
    },
    /// Boolean attribute comparison
    Bool {
        /// Attribute name
        field: &'static str,
        /// Extractor
        extract: BoolFn,
        /// Operator
        op: BoolOp,
        /// Operand
        operand: bool,
    },
    /// Date attribute comparison
    Date {
        /// Attribute name
        field: &'static str,
        /// Extractor
        extract: DateFn,
        /// Operator
        op: DateOp,
        /// Operand
        operand: NaiveDate,
    },
    /// Every inner predicate must hold
    And(Vec<Predicate>),
}

impl Predicate {
    /// Combine predicates: none is `Always`, one is itself, more is `And`
    pub fn all(mut predicates: Vec<Predicate>) -> Self {
        match predicates.len() {
            0 => Predicate::Always,
            1 => predicates.remove(0),
            _ => Predicate::And(predicates),
        }
    }

    /// True if this predicate accepts everything without looking
    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::Always)
    }

    /// Evaluate against a record
    ///
    /// Only fails when a record's date attribute cannot be derived, which is
    /// a defect in the record rather than in the request.
    pub fn matches(&self, record: &Record) -> QueryResult<bool> {
        match self {
            Predicate::Always => Ok(true),
            Predicate::Long { extract, cmp, .. } => Ok(cmp.test(extract(record))),
            Predicate::Str {
                extract,
                op,
                operand,
                ..
            } => Ok(op.test(extract(record), operand)),
            Predicate::Bool {
                extract,
                op,
                operand,
                ..
            } => {
                let value = extract(record);
                Ok(match op {
                    BoolOp::Eq => value == *operand,
                    BoolOp::NotEq => value != *operand,
                })
            },
            Predicate::Date {
                field,
                extract,
                op,
                operand,
            } => {
                let value = extract(record).ok_or_else(|| {
                    QueryError::invariant(format!(
                        "record {} ({}) has no valid {}",
                        record.id, record.path, field
                    ))
                })?;
                Ok(op.test(value, *operand))
            },
            Predicate::And(inner) => {
                for predicate in inner {
                    if !predicate.matches(record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => write!(f, "Always"),
            Predicate::Long { field, cmp, .. } => {
                write!(f, "{field} {:?} {}", cmp.op(), cmp.operand())
            },
            Predicate::Str {
                field, op, operand, ..
            } => write!(f, "{field} {op:?} {operand:?}"),
            Predicate::Bool {
                field, op, operand, ..
            } => write!(f, "{field} {op:?} {operand}"),
            Predicate::Date {
                field, op, operand, ..
            } => write!(f, "{field} {op:?} {operand}"),
            Predicate::And(inner) => f.debug_list().entries(inner).finish(),
        }
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Compiles filter specs against the attribute catalog
#[derive(Clone)]
pub struct FilterCompiler {
    catalog: Arc<AttributeCatalog>,
    clock: Arc<dyn Clock>,
}

impl FilterCompiler {
    /// Create a compiler reading "now" from `clock`
    pub fn new(catalog: Arc<AttributeCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    /// Catalog used for field resolution
    pub fn catalog(&self) -> &Arc<AttributeCatalog> {
        &self.catalog
    }

    /// Compile a single `(field, "operator:operand")` pair
    pub fn compile(&self, field: &str, spec: &str) -> QueryResult<Predicate> {
        let attribute = self.catalog.resolve(field)?;
        let (op_name, operand) = split_spec(field, spec)?;
        let name = attribute.name;

        let unsupported = |kind: ValueKind, valid: &[&str]| QueryError::UnsupportedOperator {
            field: name.to_string(),
            operator: op_name.to_string(),
            kind,
            valid: join_valid(valid),
        };

        let predicate = match &attribute.extractor {
            Extractor::Long(extract) => {
                let now = self.clock.now_millis();
                Predicate::Long {
                    field: name,
                    extract: extract.clone(),
                    cmp: LongComparison::compile(name, op_name, operand, now)?,
                }
            },
            Extractor::Str(extract) => Predicate::Str {
                field: name,
                extract: *extract,
                op: StringOp::parse(op_name)
                    .ok_or_else(|| unsupported(ValueKind::Str, StringOp::NAMES))?,
                operand: operand.to_string(),
            },
            Extractor::Bool(extract) => {
                let op = BoolOp::parse(op_name)
                    .ok_or_else(|| unsupported(ValueKind::Bool, BoolOp::NAMES))?;
                let operand = if operand.eq_ignore_ascii_case("true") {
                    true
                } else if operand.eq_ignore_ascii_case("false") {
                    false
                } else {
                    return Err(QueryError::malformed(
                        format!("{name}:{op_name}"),
                        operand,
                        "expected 'true' or 'false'",
                    ));
                };
                Predicate::Bool {
                    field: name,
                    extract: *extract,
                    op,
                    operand,
                }
            },
            Extractor::Date(extract) => {
                let op = DateOp::parse(op_name)
                    .ok_or_else(|| unsupported(ValueKind::Date, DateOp::NAMES))?;
                let day = parse_day(operand).ok_or_else(|| {
                    QueryError::malformed(format!("{name}:{op_name}"), operand, "expected MM/dd/yyyy")
                })?;
                Predicate::Date {
                    field: name,
                    extract: *extract,
                    op,
                    operand: day,
                }
            },
        };

        debug!(field = name, spec = spec, "Compiled filter");
        Ok(predicate)
    }

    /// Compile parallel lists of fields and op specs into one conjunction
    pub fn compile_all<F, S>(&self, fields: &[F], specs: &[S]) -> QueryResult<Predicate>
    where
        F: AsRef<str>,
        S: AsRef<str>,
    {
        if fields.len() != specs.len() {
            return Err(QueryError::malformed(
                "filters",
                format!("{} fields, {} specs", fields.len(), specs.len()),
                "every field needs exactly one 'operator:operand' spec",
            ));
        }

        let predicates = fields
            .iter()
            .zip(specs)
            .map(|(field, spec)| self.compile(field.as_ref(), spec.as_ref()))
            .collect::<QueryResult<Vec<_>>>()?;

        Ok(Predicate::all(predicates))
    }
}

impl fmt::Debug for FilterCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCompiler")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
