//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Independent worker loops per process
    pub concurrency: usize,
    /// Sleep after an empty poll
    pub poll_interval: Duration,
    /// Sleep after the broker was unreachable, and between status-write retries
    pub reconnect_interval: Duration,
    /// Infrastructure errors in a row before the long backoff
    pub max_consecutive_errors: u32,
    /// Attempts for each task status write
    pub status_write_attempts: u32,
    /// Port for the Prometheus scrape endpoint (disabled when unset)
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: Duration::from_millis(1000),
            reconnect_interval: Duration::from_secs(5),
            max_consecutive_errors: 5,
            status_write_attempts: 10,
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            concurrency: std::env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(1),
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            reconnect_interval: Duration::from_secs(
                std::env::var("WORKER_RECONNECT_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            max_consecutive_errors: std::env::var("WORKER_MAX_CONSECUTIVE_ERRORS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            status_write_attempts: std::env::var("WORKER_STATUS_WRITE_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),
            metrics_port: std::env::var("WORKER_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Backoff after too many consecutive errors.
    pub fn error_backoff(&self) -> Duration {
        self.reconnect_interval * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_consecutive_errors, 5);
        assert_eq!(config.error_backoff(), Duration::from_secs(10));
    }
}
