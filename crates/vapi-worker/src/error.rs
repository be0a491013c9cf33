//! Worker error types.

use thiserror::Error;
use vapi_models::TaskStatus;
use vapi_queue::QueueError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Could not record {status} for task {job_id}: {source}")]
    StatusWrite {
        job_id: String,
        status: TaskStatus,
        #[source]
        source: QueueError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn status_write(job_id: impl Into<String>, status: TaskStatus, source: QueueError) -> Self {
        Self::StatusWrite {
            job_id: job_id.into(),
            status,
            source,
        }
    }

    /// Whether the error came from losing the broker.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Queue(e) => e.is_transient(),
            WorkerError::StatusWrite { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
