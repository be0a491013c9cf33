//! Queue error types.

use thiserror::Error;
use vapi_models::TransitionError;

use crate::store::StoreError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Broker command failed: {0}")]
    Store(String),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Job ID already exists: {0}")]
    DuplicateJobId(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn task_not_found(job_id: impl Into<String>) -> Self {
        Self::TaskNotFound(job_id.into())
    }

    /// Wrap a store error raised by the named operation.
    pub fn store(operation: &str, err: StoreError) -> Self {
        match err {
            StoreError::Connectivity(msg) => Self::Unavailable(format!("{operation}: {msg}")),
            StoreError::Command(msg) => Self::Store(format!("{operation}: {msg}")),
        }
    }

    /// Whether the failure is a connectivity problem the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connectivity(msg) => Self::Unavailable(msg),
            StoreError::Command(msg) => Self::Store(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(QueueError::unavailable("down").is_transient());
        assert!(!QueueError::Store("WRONGTYPE".into()).is_transient());
        assert!(!QueueError::UnknownTaskType("x".into()).is_transient());
    }

    #[test]
    fn test_store_error_mapping_names_operation() {
        let err = QueueError::store("pop", StoreError::connectivity("reset by peer"));
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "Broker unavailable: pop: reset by peer");

        let err = QueueError::store("set", StoreError::command("OOM"));
        assert!(!err.is_transient());
    }
}
