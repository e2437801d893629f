//! Prometheus metrics for the query engine
//!
//! Every public engine operation reports its outcome, latency and the number
//! of records it scanned. Input errors are additionally counted by error
//! kind so a dashboard can tell malformed requests apart from defects.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_counter_vec,
    CounterVec, Encoder, Gauge, HistogramVec, IntCounterVec, TextEncoder,
};

use crate::query::error::QueryError;

lazy_static! {
    // === Operation Counters ===

    /// Total engine operations
    pub static ref OPERATIONS_TOTAL: CounterVec = register_counter_vec!(
        "nsq_operations_total",
        "Total engine operations",
        &["operation", "status"]
    ).unwrap();

    /// Records scanned by engine operations
    pub static ref RECORDS_SCANNED: IntCounterVec = register_int_counter_vec!(
        "nsq_records_scanned_total",
        "Records scanned by engine operations",
        &["operation"]
    ).unwrap();

    /// Failed operations by error kind
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "nsq_errors_total",
        "Failed engine operations by error kind",
        &["kind", "operation"]
    ).unwrap();

    // === Latency Histograms ===

    /// Engine operation duration
    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "nsq_operation_duration_seconds",
        "Engine operation latency in seconds",
        &["operation"],
        vec![0.0001, 0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).unwrap();

    // === Snapshot Gauges ===

    /// Records in the current snapshot
    pub static ref SNAPSHOT_RECORDS: Gauge = register_gauge!(
        "nsq_snapshot_records",
        "Records in the current namespace snapshot"
    ).unwrap();

    /// Generation of the current snapshot
    pub static ref SNAPSHOT_GENERATION: Gauge = register_gauge!(
        "nsq_snapshot_generation",
        "Generation counter of the current namespace snapshot"
    ).unwrap();
}

/// Initialize metrics system
pub fn init() {
    SNAPSHOT_RECORDS.set(0.0);
    SNAPSHOT_GENERATION.set(0.0);

    tracing::info!("Metrics system initialized");
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record the outcome of an engine operation
#[inline]
pub fn record_operation<T>(
    operation: &str,
    duration_secs: f64,
    records: usize,
    result: &Result<T, QueryError>,
) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => {
            record_error(e, operation);
            "error"
        }
    };

    OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);

    RECORDS_SCANNED
        .with_label_values(&[operation])
        .inc_by(records as u64);
}

/// Record a failed operation
#[inline]
pub fn record_error(error: &QueryError, operation: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error.label(), operation])
        .inc();
}

/// Update the snapshot gauges after a refresh
#[inline]
pub fn update_snapshot(records: usize, generation: u64) {
    SNAPSHOT_RECORDS.set(records as f64);
    SNAPSHOT_GENERATION.set(generation as f64);
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`
pub(crate) fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation() {
        let ok: Result<i64, QueryError> = Ok(3);
        record_operation("sum", 0.001, 3, &ok);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("nsq_operations_total"));
        assert!(metrics.contains("nsq_records_scanned_total"));
    }

    #[test]
    fn test_record_error_by_kind() {
        let err: Result<i64, QueryError> = Err(QueryError::UnknownAggregation {
            name: "bogus".to_string(),
            valid: "count".to_string(),
        });
        record_operation("sum", 0.001, 0, &err);
        assert!(ERRORS_TOTAL.with_label_values(&["unknown_aggregation", "sum"]).get() >= 1.0);
    }

    #[test]
    fn test_gather_metrics() {
        update_snapshot(42, 2);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("nsq_snapshot_records"));
        assert!(metrics.contains("nsq_snapshot_generation"));
    }

    #[test]
    fn test_elapsed_ms_saturates() {
        assert_eq!(elapsed_ms(Duration::from_millis(1_500)), 1_500);
        assert_eq!(elapsed_ms(Duration::from_micros(999)), 0);
        assert_eq!(elapsed_ms(Duration::MAX), u64::MAX);
    }
}
