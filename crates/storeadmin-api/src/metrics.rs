//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle used by `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "storeadmin_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "storeadmin_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "storeadmin_http_requests_in_flight";

    // Auth metrics
    pub const AUTH_EVENTS_TOTAL: &str = "storeadmin_auth_events_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "storeadmin_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a register/login/refresh attempt.
pub fn record_auth_event(event: &'static str, success: bool) {
    let labels = [
        ("event", event.to_string()),
        ("outcome", if success { "success" } else { "failure" }.to_string()),
    ];
    counter!(names::AUTH_EVENTS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Path segments that are route literals rather than document ids.
const LITERAL_SEGMENTS: [&str; 12] = [
    "api", "auth", "admin", "products", "orders", "popular", "stats", "status", "profile",
    "dashboard", "me", "health",
];

/// Collapse document ids so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous: Option<&str> = None;

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        let is_id = matches!(previous, Some("products") | Some("orders"))
            && !LITERAL_SEGMENTS.contains(&segment);
        out.push_str(if is_id { ":id" } else { segment });
        previous = Some(segment);
    }

    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
