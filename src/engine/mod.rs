//! Query engine facade and its collaborators
//!
//! `QueryEngine` is the in-process call contract of the crate: record sets,
//! combined and find filters, scalar sums, one histogram entry point per
//! dimension, bucket pruning and path export. Collaborators it does not own
//! (version compatibility, the clock) plug in through the traits in
//! `traits`.
//!
//! # Example
//!
//! ```rust
//! use namespace_query::engine::{QueryEngine, Transforms};
//! use namespace_query::types::{FileAttrs, Record};
//!
//! let engine = QueryEngine::builder()
//!     .with_records(vec![
//!         Record::file(1, "/data/a.log", FileAttrs::new(10, 3, 128)).with_owner("alice", "staff"),
//!         Record::file(2, "/data/b.log", FileAttrs::new(2_000, 3, 128)).with_owner("bob", "staff"),
//!     ])
//!     .build()
//!     .unwrap();
//!
//! let files = engine.set("files").unwrap();
//! let big = engine.combined_filter(&files, &["fileSize"], &["gt:100"]).unwrap();
//! assert_eq!(engine.sum(&big, "count").unwrap(), 1);
//!
//! let by_user = engine.owner_histogram(&files, "fileSize", None).unwrap();
//! assert_eq!(by_user.get("bob"), Some(&2_000));
//!
//! let by_size = engine.diskspace_histogram(&files, "count", None, &Transforms::new()).unwrap();
//! assert_eq!(by_size.total(), 2);
//! ```

pub mod builder;
pub mod histograms;
pub mod traits;

pub use builder::{EngineStats, QueryEngine, QueryEngineBuilder};
pub use histograms::Transforms;
pub use traits::{Clock, DefaultCompat, FixedClock, SystemClock, VersionCompat};
