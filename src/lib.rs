//! Namespace Query - in-memory query and aggregation engine for filesystem namespaces
//!
//! This library filters, aggregates and buckets snapshots of a hierarchical
//! filesystem namespace (millions of file and directory records) with:
//! - Dynamic filter expressions compiled against a typed attribute catalog
//! - Primary-key indexed record sets with data-parallel retrieval
//! - Scalar aggregations and ranged or discrete-key histograms
//! - Min, max and arbitrary-precision average "find" reductions
//! - Conditional bucket pruning and sorted path export

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregation;
pub mod engine;
pub mod error;
pub mod query;
pub mod storage;
pub mod types;

/// Prometheus metrics for engine operations
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Tracing subscriber setup
pub mod telemetry;

// Re-export main types
pub use aggregation::{Aggregation, Histogram};
pub use config::EngineConfig;
pub use engine::{QueryEngine, QueryEngineBuilder, Transforms};
pub use error::{Error, QueryError, QueryResult, Result};
pub use storage::{IndexedSubset, Subset};
pub use types::{DirAttrs, FileAttrs, Record, RecordId};
