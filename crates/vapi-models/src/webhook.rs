//! Webhook notification payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::JobId;
use crate::task::TaskStatus;
use crate::timestamp::epoch_seconds;

/// Event POSTed to a task's callback address on terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub job_id: JobId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Emission time (epoch seconds)
    pub timestamp: f64,
}

impl WebhookEvent {
    /// Completion event carrying the handler result.
    pub fn completed(job_id: JobId, result: Value) -> Self {
        Self {
            job_id,
            status: TaskStatus::Completed,
            result: Some(result),
            error: None,
            timestamp: epoch_seconds(),
        }
    }

    /// Failure event carrying the error message.
    pub fn failed(job_id: JobId, error: impl Into<String>) -> Self {
        Self {
            job_id,
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
            timestamp: epoch_seconds(),
        }
    }
}
