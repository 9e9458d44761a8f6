//! Prometheus metrics for rift-repository.
//!
//! Tracks document store traffic, stub list flushes and response rotation.
use crate::error::RepositoryResult;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Document store operations
    pub static ref STORE_OPS_TOTAL: CounterVec = register_counter_vec!(
        "rift_store_ops_total",
        "Total number of document store operations",
        &["operation", "result"]  // result: success|error
    )
    .unwrap();

    /// Stub list write-throughs
    pub static ref STUB_FLUSHES_TOTAL: CounterVec = register_counter_vec!(
        "rift_stub_flushes_total",
        "Total number of stub list flushes to the document store",
        &["trigger", "result"]  // trigger: structural|response|match|request
    )
    .unwrap();

    /// Flush duration
    pub static ref STUB_FLUSH_DURATION_MS: HistogramVec = register_histogram_vec!(
        "rift_stub_flush_duration_ms",
        "Histogram of stub list flush time in milliseconds",
        &["trigger"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]
    )
    .unwrap();

    /// Responses served by the rotation queue
    pub static ref RESPONSES_SERVED_TOTAL: CounterVec = register_counter_vec!(
        "rift_responses_served_total",
        "Total number of responses taken from stub rotation queues",
        &["source"]  // source: configured|default
    )
    .unwrap();

    /// Match records whose write-through failed
    pub static ref MATCHES_DROPPED_TOTAL: CounterVec = register_counter_vec!(
        "rift_matches_dropped_total",
        "Match records that could not be persisted",
        &["port"]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

fn result_label<T>(result: &RepositoryResult<T>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

/// Helper to record a document store operation
pub fn record_store_op<T>(operation: &str, result: &RepositoryResult<T>) {
    STORE_OPS_TOTAL
        .with_label_values(&[operation, result_label(result)])
        .inc();
}

/// Helper to record a stub list flush
pub fn record_flush<T>(trigger: &str, duration_ms: f64, result: &RepositoryResult<T>) {
    STUB_FLUSHES_TOTAL
        .with_label_values(&[trigger, result_label(result)])
        .inc();
    STUB_FLUSH_DURATION_MS
        .with_label_values(&[trigger])
        .observe(duration_ms);
}

/// Helper to record a served response
pub fn record_response_served(configured: bool) {
    let source = if configured { "configured" } else { "default" };
    RESPONSES_SERVED_TOTAL.with_label_values(&[source]).inc();
}

/// Helper to record a match that was not persisted
pub fn record_match_dropped(port: u16) {
    MATCHES_DROPPED_TOTAL
        .with_label_values(&[&port.to_string()])
        .inc();
}
