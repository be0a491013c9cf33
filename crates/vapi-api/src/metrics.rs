//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder and return the handle that renders it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vapi_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vapi_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vapi_http_requests_in_flight";

    pub const QUEUE_LENGTH: &str = "vapi_queue_length";
    pub const TASKS_SUBMITTED_TOTAL: &str = "vapi_tasks_submitted_total";
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

/// Update queue length gauge.
pub fn set_queue_length(length: u64) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

/// Record a task submission.
pub fn record_task_submitted(task_type: &str) {
    let labels = [("task_type", task_type.to_string())];
    counter!(names::TASKS_SUBMITTED_TOTAL, &labels).increment(1);
}

/// Collapse caller-chosen path segments so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    if path.starts_with("/storage/") {
        return "/storage/*".to_string();
    }
    for prefix in ["/api/v1/jobs/", "/api/v1/tasks/"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            if !rest.is_empty() {
                let placeholder = if prefix.ends_with("jobs/") { ":job_id" } else { ":task_type" };
                return format!("{prefix}{placeholder}");
            }
        }
    }
    path.to_string()
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
