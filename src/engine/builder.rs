//! Query engine builder
//!
//! This module provides the main `QueryEngine` type that wires the attribute
//! catalog, filter compiler, record store and histogram engine together, and
//! exposes the in-process call contract used by the surrounding service.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::traits::{Clock, DefaultCompat, SystemClock, VersionCompat};
use crate::aggregation::data_model::Histogram;
use crate::aggregation::functions::Aggregation;
use crate::aggregation::histogram::HistogramEngine;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::metrics;
use crate::query::catalog::AttributeCatalog;
use crate::query::error::{join_valid, QueryError, QueryResult};
use crate::query::export;
use crate::query::filter::{split_spec, FilterCompiler};
use crate::query::prune;
use crate::storage::{IndexedSubset, RecordStore, Snapshot, Subset, VALID_SETS};
use crate::types::{EpochMillis, Record};

/// Builder for configuring the query engine with custom collaborators
pub struct QueryEngineBuilder {
    compat: Option<Arc<dyn VersionCompat>>,
    clock: Option<Arc<dyn Clock>>,
    records: Vec<Record>,
    config: EngineConfig,
}

impl QueryEngineBuilder {
    /// Create a new engine builder
    pub fn new() -> Self {
        Self {
            compat: None,
            clock: None,
            records: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Set the version compatibility layer
    pub fn with_compat<C>(mut self, compat: C) -> Self
    where
        C: VersionCompat,
    {
        self.compat = Some(Arc::new(compat));
        self
    }

    /// Set the clock read by relative-time filters and age histograms
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Set the clock from an existing Arc
    pub fn with_clock_arc(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the initial snapshot
    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    /// Set engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine
    ///
    /// Fails if the configuration does not validate.
    pub fn build(self) -> Result<QueryEngine> {
        self.config.validate()?;

        let compat = self.compat.unwrap_or_else(|| Arc::new(DefaultCompat));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let catalog = Arc::new(AttributeCatalog::new(compat.clone()));
        let compiler = FilterCompiler::new(catalog.clone(), clock.clone());
        let store = RecordStore::new(self.records);
        let histograms = HistogramEngine::new(self.config.parallel.clone());

        let snapshot = store.snapshot();
        if self.config.monitoring.metrics_enabled {
            metrics::update_snapshot(snapshot.len(), snapshot.generation());
        }

        info!(
            compat = compat.compat_id(),
            attributes = catalog.len(),
            records = snapshot.len(),
            parallel_threshold = self.config.parallel.parallel_threshold,
            "Query engine built"
        );

        Ok(QueryEngine {
            catalog,
            compiler,
            store,
            histograms,
            clock,
            config: self.config,
        })
    }
}

impl Default for QueryEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory query and aggregation engine over a namespace snapshot
pub struct QueryEngine {
    pub(super) catalog: Arc<AttributeCatalog>,
    pub(super) compiler: FilterCompiler,
    pub(super) store: RecordStore,
    pub(super) histograms: HistogramEngine,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: EngineConfig,
}

impl QueryEngine {
    /// Start building an engine
    pub fn builder() -> QueryEngineBuilder {
        QueryEngineBuilder::new()
    }

    /// Attribute catalog
    pub fn catalog(&self) -> &Arc<AttributeCatalog> {
        &self.catalog
    }

    /// Filter compiler
    pub fn compiler(&self) -> &FilterCompiler {
        &self.compiler
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time according to the engine clock
    pub fn now(&self) -> EpochMillis {
        self.clock.now_millis()
    }

    // =========================================================================
    // Record Sets
    // =========================================================================

    /// Names of the predefined record sets
    pub fn valid_sets(&self) -> &'static [&'static str] {
        VALID_SETS
    }

    /// Pin the current snapshot for the duration of a call
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    /// Named set from the current snapshot
    pub fn set(&self, name: &str) -> QueryResult<IndexedSubset> {
        self.store.set(name)
    }

    /// Replace the snapshot; returns the generation assigned to this refresh
    pub fn refresh(&self, records: Vec<Record>) -> u64 {
        let generation = self.store.refresh(records);
        if self.config.monitoring.metrics_enabled {
            let current = self.store.snapshot();
            metrics::update_snapshot(current.len(), current.generation());
        }
        generation
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    /// Records of `subset` matching every `(field, "op:operand")` pair
    ///
    /// No filters returns the subset unchanged.
    pub fn combined_filter<F, S>(&self, subset: &Subset, fields: &[F], specs: &[S]) -> QueryResult<Subset>
    where
        F: AsRef<str>,
        S: AsRef<str>,
    {
        self.observe("combined_filter", subset.len(), || {
            let predicate = self.compiler.compile_all(fields, specs)?;
            subset.retrieve(&predicate, &self.config.parallel)
        })
    }

    /// The single record with the largest or smallest value of a long field
    ///
    /// `spec` is `"max:field"` or `"min:field"`. Ties go to the record that
    /// comes first in the subset. An empty spec returns the subset unchanged;
    /// an empty subset yields an empty result.
    pub fn find_filter(&self, subset: &Subset, spec: &str) -> QueryResult<Subset> {
        self.observe("find_filter", subset.len(), || {
            if spec.trim().is_empty() {
                return Ok(subset.clone());
            }

            let (mode, field) = split_spec("findFilter", spec)?;
            let want_max = match mode {
                "max" => true,
                "min" => false,
                _ => {
                    return Err(QueryError::UnknownFindMode {
                        mode: mode.to_string(),
                        valid: join_valid(["min", "max"]),
                    })
                },
            };
            let extract = self.catalog.resolve_long(field, mode)?;

            // (value, position); the earlier position wins a tie
            let pick = |a: (i64, usize), b: (i64, usize)| {
                let better = if want_max { b.0 > a.0 } else { b.0 < a.0 };
                if better || (b.0 == a.0 && b.1 < a.1) {
                    b
                } else {
                    a
                }
            };

            let records = subset.records();
            let best = if self.config.parallel.should_parallelize(records.len()) {
                records
                    .par_iter()
                    .enumerate()
                    .with_min_len(self.config.parallel.morsel_size)
                    .map(|(i, r)| (extract(r.as_ref()), i))
                    .reduce_with(pick)
            } else {
                records
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (extract(r.as_ref()), i))
                    .reduce(pick)
            };

            Ok(match best {
                Some((_, i)) => Subset::new(vec![records[i].clone()]),
                None => Subset::empty(),
            })
        })
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    /// Reduce a subset with a named aggregation
    pub fn sum(&self, subset: &Subset, aggregation: &str) -> QueryResult<i64> {
        self.observe("sum", subset.len(), || {
            let aggregation = Aggregation::parse(aggregation)?;
            Ok(aggregation.sum(subset, &self.config.parallel))
        })
    }

    /// Keep the buckets satisfying every `"op:operand"` condition in `spec`
    ///
    /// Relative-time operators are evaluated against the engine clock.
    pub fn remove_keys_on_conditional(&self, histogram: Histogram, spec: &str) -> QueryResult<Histogram> {
        let buckets = histogram.len();
        self.observe("remove_keys_on_conditional", buckets, || {
            prune::remove_keys_on_conditional(histogram, spec, self.now())
        })
    }

    /// Keep the vector-valued buckets satisfying every `"index:op:operand"` condition
    pub fn remove_keys_on_conditional_vec(
        &self,
        histogram: Histogram<Vec<i64>>,
        spec: &str,
    ) -> QueryResult<Histogram<Vec<i64>>> {
        let buckets = histogram.len();
        self.observe("remove_keys_on_conditional_vec", buckets, || {
            prune::remove_keys_on_conditional_vec(histogram, spec, self.now())
        })
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Write up to `limit` paths of `subset`, sorted, one per line
    ///
    /// `None` falls back to the configured default limit.
    pub fn dump_paths<W: Write>(&self, subset: &Subset, limit: Option<usize>, sink: W) -> QueryResult<usize> {
        let limit = limit.or_else(|| self.config.export.dump_limit());
        self.observe("dump_paths", subset.len(), || {
            export::dump_paths(subset, limit, sink, &self.config.parallel)
        })
    }

    /// Snapshot statistics
    pub fn stats(&self) -> EngineStats {
        let snapshot = self.store.snapshot();
        let count = |name: &str| snapshot.set(name).map(|s| s.len()).unwrap_or(0);
        EngineStats {
            generation: snapshot.generation(),
            records: snapshot.len(),
            files: count("files"),
            dirs: count("dirs"),
            attributes: self.catalog.len(),
        }
    }

    /// Time an operation, record its metrics and log the outcome
    pub(super) fn observe<T, F>(&self, operation: &'static str, records: usize, f: F) -> QueryResult<T>
    where
        F: FnOnce() -> QueryResult<T>,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        if self.config.monitoring.metrics_enabled {
            metrics::record_operation(operation, elapsed.as_secs_f64(), records, &result);
        }

        match &result {
            Ok(_) => debug!(
                operation,
                records,
                elapsed_ms = metrics::elapsed_ms(elapsed),
                "Operation completed"
            ),
            Err(e) if e.is_input_error() => debug!(operation, error = %e, "Rejected request"),
            Err(e) => warn!(operation, error = %e, "Operation failed"),
        }
        result
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Engine statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Generation of the current snapshot
    pub generation: u64,
    /// Records in the snapshot
    pub records: usize,
    /// File records
    pub files: usize,
    /// Directory records
    pub dirs: usize,
    /// Attributes in the catalog
    pub attributes: usize,
}
