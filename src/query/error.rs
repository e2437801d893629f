//! Query error types
//!
//! Every caller input error names the offending token and the list of valid
//! values it could have been. Internal defects (`InvariantViolation`) are kept
//! apart so the surrounding service can fail the single request without
//! mistaking a bug for bad input.

use std::fmt;

use thiserror::Error;

/// Value namespace an attribute belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 64-bit integer attributes (sizes, counts, timestamps)
    Long,
    /// String attributes (names, owners)
    Str,
    /// Boolean flags
    Bool,
    /// Day-truncated calendar dates
    Date,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Long => write!(f, "long"),
            ValueKind::Str => write!(f, "string"),
            ValueKind::Bool => write!(f, "boolean"),
            ValueKind::Date => write!(f, "date"),
        }
    }
}

/// Errors raised by the query engine
#[derive(Error, Debug)]
pub enum QueryError {
    /// Named record set does not exist
    #[error("Unknown set '{name}'; valid sets are: {valid}")]
    UnknownSet {
        /// Requested set name
        name: String,
        /// Comma separated list of valid set names
        valid: String,
    },

    /// Field name did not resolve to any attribute namespace
    #[error("Unresolved filter '{field}'; valid filters are: {valid}")]
    UnresolvedFilter {
        /// Requested field name
        field: String,
        /// Comma separated list of valid field names
        valid: String,
    },

    /// Operator is not defined for the attribute's value kind
    #[error("Unsupported operator '{operator}' for {kind} attribute '{field}'; valid operators are: {valid}")]
    UnsupportedOperator {
        /// Field the operator was applied to
        field: String,
        /// Requested operator
        operator: String,
        /// Value kind of the field
        kind: ValueKind,
        /// Comma separated list of operators valid for the kind
        valid: String,
    },

    /// Operand could not be parsed for the operator
    #[error("Malformed operand '{operand}' for '{context}': {reason}")]
    MalformedOperand {
        /// Field, operator or condition the operand belongs to
        context: String,
        /// Raw operand text
        operand: String,
        /// Why parsing failed
        reason: String,
    },

    /// Aggregation name is not in the reducer table
    #[error("Unknown aggregation '{name}'; valid aggregations are: {valid}")]
    UnknownAggregation {
        /// Requested aggregation
        name: String,
        /// Comma separated list of valid aggregations
        valid: String,
    },

    /// Find mode is not one of min/max/avg
    #[error("Unknown find mode '{mode}'; valid modes are: {valid}")]
    UnknownFindMode {
        /// Requested mode
        mode: String,
        /// Comma separated list of valid modes
        valid: String,
    },

    /// Internal defect: an otherwise valid record produced an impossible value
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Output sink failure during export
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create a malformed operand error
    pub fn malformed(
        context: impl Into<String>,
        operand: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        QueryError::MalformedOperand {
            context: context.into(),
            operand: operand.into(),
            reason: reason.into(),
        }
    }

    /// Create an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        QueryError::InvariantViolation(message.into())
    }

    /// True for errors caused by the caller's request rather than a defect
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            QueryError::InvariantViolation(_) | QueryError::Io(_)
        )
    }

    /// Short stable label, used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            QueryError::UnknownSet { .. } => "unknown_set",
            QueryError::UnresolvedFilter { .. } => "unresolved_filter",
            QueryError::UnsupportedOperator { .. } => "unsupported_operator",
            QueryError::MalformedOperand { .. } => "malformed_operand",
            QueryError::UnknownAggregation { .. } => "unknown_aggregation",
            QueryError::UnknownFindMode { .. } => "unknown_find_mode",
            QueryError::InvariantViolation(_) => "invariant_violation",
            QueryError::Io(_) => "io",
        }
    }
}

/// Join valid names for error messages
pub(crate) fn join_valid<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
