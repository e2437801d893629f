//! Filter compilation and result post-processing
//!
//! # Architecture
//!
//! ```text
//! (field, "op:operand")*
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Resolve   │  AttributeCatalog: field → (kind, extractor)
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Compile   │  Operator table per kind → Predicate
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Combine   │  Conjunction, short-circuiting
//! └─────────────┘
//!      │
//!      ▼
//!   Subset::retrieve ──► aggregation ──► prune ──► caller
//!                  └───► export
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use namespace_query::engine::traits::{DefaultCompat, FixedClock};
//! use namespace_query::query::{AttributeCatalog, FilterCompiler};
//! use namespace_query::types::{FileAttrs, Record};
//!
//! let catalog = Arc::new(AttributeCatalog::new(Arc::new(DefaultCompat)));
//! let compiler = FilterCompiler::new(catalog, Arc::new(FixedClock(0)));
//!
//! let predicate = compiler
//!     .compile_all(&["fileSize", "path"], &["gte:1024", "startsWith:/data"])
//!     .unwrap();
//! let record = Record::file(1, "/data/big.bin", FileAttrs::new(4096, 3, 128));
//! assert!(predicate.matches(&record).unwrap());
//! ```

pub mod catalog;
pub mod error;
pub mod export;
pub mod filter;
pub mod prune;

// Re-export main types
pub use catalog::{Attribute, AttributeCatalog, Extractor, LongFn};
pub use error::{QueryError, QueryResult, ValueKind};
pub use export::dump_paths;
pub use filter::{FilterCompiler, LongComparison, LongOp, Predicate};
pub use prune::{remove_keys_on_conditional, remove_keys_on_conditional_vec, Conditions, IndexedConditions};
