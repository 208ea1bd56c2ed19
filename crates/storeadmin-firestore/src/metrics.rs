//! Firestore metrics collection.
//!
//! Request counts, latency, retries, and fallbacks from the primary store
//! to the secondary one.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";

    /// Operations served by the fallback store after the primary failed.
    pub const FALLBACKS_TOTAL: &str = "store_fallbacks_total";
}

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record an operation that moved to the fallback store.
pub fn record_fallback(operation: &str, primary: &str, fallback: &str) {
    counter!(
        names::FALLBACKS_TOTAL,
        "operation" => operation.to_string(),
        "primary" => primary.to_string(),
        "fallback" => fallback.to_string()
    )
    .increment(1);
}
