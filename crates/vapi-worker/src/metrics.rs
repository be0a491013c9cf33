//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const TASKS_PROCESSED_TOTAL: &str = "vapi_tasks_processed_total";
    pub const TASK_DURATION_SECONDS: &str = "vapi_task_duration_seconds";
    pub const WORKER_ERRORS_TOTAL: &str = "vapi_worker_errors_total";
    pub const WEBHOOK_DELIVERIES_TOTAL: &str = "vapi_webhook_deliveries_total";
}

/// Serve the Prometheus scrape endpoint on `port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {e}")))
}

/// Record a task reaching a terminal status.
pub fn record_task(task_type: &str, status: &str, duration_secs: f64) {
    let labels = [
        ("task_type", task_type.to_string()),
        ("status", status.to_string()),
    ];
    counter!(names::TASKS_PROCESSED_TOTAL, &labels).increment(1);
    histogram!(names::TASK_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an infrastructure error in a worker loop.
pub fn record_worker_error(kind: &str) {
    counter!(names::WORKER_ERRORS_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record the outcome of a webhook delivery.
pub fn record_webhook(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!(names::WEBHOOK_DELIVERIES_TOTAL, "outcome" => outcome).increment(1);
}
