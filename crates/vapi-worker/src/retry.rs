//! Retry helpers for the worker loop.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vapi_queue::{QueueError, QueueResult};

/// Fixed-interval retry for task status writes.
#[derive(Debug, Clone)]
pub struct StatusWriteRetry {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl StatusWriteRetry {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Run `write` until it succeeds or fails with a non-transient error.
    ///
    /// Only connectivity failures are retried. Cancellation does not cut the
    /// retries short: a status write in progress is part of the current task.
    pub async fn run<F, Fut, T>(&self, operation: &str, write: F) -> QueueResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = QueueResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match write().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Status write failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Sleep for `delay` unless `token` is cancelled first.
///
/// Returns `false` when woken by cancellation.
pub async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Counts infrastructure errors in a row.
#[derive(Debug)]
pub struct ConsecutiveErrors {
    count: u32,
    threshold: u32,
}

impl ConsecutiveErrors {
    pub fn new(threshold: u32) -> Self {
        Self { count: 0, threshold }
    }

    /// Record a successful iteration (resets the count).
    pub fn record_success(&mut self) {
        if self.count > 0 {
            debug!("Worker recovered after {} consecutive errors", self.count);
        }
        self.count = 0;
    }

    /// Record an error. Returns `true` once the count passes the threshold,
    /// resetting it so normal polling resumes after the caller's backoff.
    pub fn record_failure(&mut self) -> bool {
        self.count += 1;
        if self.count > self.threshold {
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Whether a failed transition means the write already landed.
pub fn already_applied(err: &QueueError, target: vapi_models::TaskStatus) -> bool {
    matches!(err, QueueError::InvalidTransition(t) if t.from == target)
}
