//! Aggregation and histogram engine
//!
//! Reduces a filtered subset either to a scalar (`Aggregation::sum`) or to a
//! histogram bucketed along a derived dimension (`HistogramEngine`).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │          Filtered Subset            │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │             Dimension               │
//! │  ranged: record → i64 → bin         │
//! │  discrete: record → label → key id  │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │         Per-worker Shards           │
//! │  sum | min | max | avg (BigInt)     │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │        Ordered Histogram            │
//! │  label → value, sentinel stripped   │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! - **Aggregation**: table of associative, commutative reducers
//! - **Layouts**: `RangedLayout` boundary tables and `KeyTable` discrete keys
//! - **Bucket cells**: sum, min, max and avg accumulators that merge in any order
//! - **HistogramEngine**: the two bucketing strategies over any reduction
//!
//! # Example
//!
//! ```rust
//! use namespace_query::aggregation::{Aggregation, HistogramEngine, Reduction, SPACE_SIZE};
//! use namespace_query::storage::Subset;
//! use namespace_query::types::{FileAttrs, Record};
//!
//! let subset = Subset::from_records(vec![
//!     Record::file(1, "/a", FileAttrs::new(10, 1, 128)),
//!     Record::file(2, "/b", FileAttrs::new(2_000_000, 1, 128)),
//! ]);
//!
//! let histogram = HistogramEngine::default()
//!     .ranged(&subset, Record::file_size, &Reduction::sum(Aggregation::FileSize), &SPACE_SIZE)
//!     .unwrap();
//! assert_eq!(histogram.total(), 2_000_010);
//! ```

pub mod accumulate;
pub mod data_model;
pub mod filetype;
pub mod functions;
pub mod histogram;
pub mod layout;

pub use accumulate::{FindMode, FindSpec, Reduction, EMPTY_BUCKET_DEFAULT};
pub use data_model::Histogram;
pub use functions::Aggregation;
pub use histogram::{DiscreteHistogram, HistogramEngine};
pub use layout::{KeyOrder, KeyTable, RangedLayout, TimeRange, MEMORY_SIZE, NO_MAPPING, SPACE_SIZE};
