//! Metrics for the federated querier
//!
//! Prometheus metrics covering store fan-out, pruning, query latency and
//! sample deduplication.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};

lazy_static! {
    // === Store Fan-out ===

    /// Store RPCs by operation and outcome
    pub static ref STORE_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "querier_store_requests_total",
        "Total store RPCs by operation and status",
        &["operation", "status"]
    ).unwrap();

    /// Stores skipped because their external labels cannot match
    pub static ref PRUNED_STORES_TOTAL: IntCounter = register_int_counter!(
        "querier_pruned_stores_total",
        "Total stores pruned by external label matching"
    ).unwrap();

    // === Latency Histograms ===

    /// Fan-out duration per query operation
    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "querier_query_duration_seconds",
        "Query fan-out latency in seconds",
        &["operation"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).unwrap();

    // === Data Counters ===

    /// Samples dropped because another input had the same timestamp
    pub static ref DROPPED_SAMPLES_TOTAL: CounterVec = register_counter_vec!(
        "querier_dropped_samples_total",
        "Total samples dropped at colliding timestamps by layer",
        &["layer"]
    ).unwrap();
}

/// Get metrics in Prometheus text format
///
/// # Returns
///
/// Result containing the formatted metrics string, or an error if encoding fails
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a store RPC outcome
#[inline]
pub fn record_store_request(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    STORE_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Record a completed fan-out
#[inline]
pub fn record_query(operation: &str, duration_secs: f64) {
    QUERY_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Record pruned stores
#[inline]
pub fn record_pruned_stores(count: usize) {
    PRUNED_STORES_TOTAL.inc_by(count as u64);
}

/// Record samples dropped at colliding timestamps
#[inline]
pub fn record_dropped_samples(layer: &str, count: u64) {
    if count > 0 {
        DROPPED_SAMPLES_TOTAL
            .with_label_values(&[layer])
            .inc_by(count as f64);
    }
}
