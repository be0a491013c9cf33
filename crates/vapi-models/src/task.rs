//! Task records and the status state machine.
//!
//! A [`TaskRecord`] is the durable representation of one unit of work. It is
//! created `Queued` by the submission path and afterwards mutated only by the
//! worker that dequeued it: `Queued -> Processing -> Completed | Failed`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::job::JobId;
use crate::timestamp::epoch_seconds;

/// Ordered argument bag passed verbatim to a task handler.
pub type TaskArguments = Map<String, Value>;

/// Task processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is queued waiting for a worker
    #[default]
    Queued,
    /// A worker dequeued the task and is executing its handler
    Processing,
    /// Handler returned a result
    Completed,
    /// Handler raised an error or the task type was unknown
    Failed,
}

impl TaskStatus {
    /// Every status, in state machine order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Queued,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Illegal status transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition for task {job_id}: {from} -> {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Durable task record, stored as JSON under the task key prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique job identifier (primary key)
    pub job_id: JobId,
    /// Registered handler name
    pub task_type: String,
    /// Handler arguments
    #[serde(default)]
    pub arguments: TaskArguments,
    /// Current status
    pub status: TaskStatus,
    /// Creation time (epoch seconds)
    pub created_at: f64,
    /// Last status change (epoch seconds)
    pub updated_at: f64,
    /// Time the task reached a terminal state (epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,
    /// Handler result, present only when completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description, present only when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Webhook notified on terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_address: Option<String>,
}

impl TaskRecord {
    /// Create a new queued task record.
    pub fn new(
        job_id: JobId,
        task_type: impl Into<String>,
        arguments: TaskArguments,
        callback_address: Option<String>,
    ) -> Self {
        let now = epoch_seconds();
        Self {
            job_id,
            task_type: task_type.into(),
            arguments,
            status: TaskStatus::Queued,
            created_at: now,
            updated_at: now,
            completed_at: None,
            result: None,
            error: None,
            callback_address,
        }
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Minimal reference pushed onto the work queue.
    pub fn to_ref(&self) -> TaskRef {
        TaskRef {
            job_id: self.job_id.clone(),
            task_type: self.task_type.clone(),
            arguments: self.arguments.clone(),
        }
    }

    /// `Queued -> Processing`.
    pub fn start_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Processing)
    }

    /// `Processing -> Completed`, recording the result.
    pub fn complete(&mut self, result: Value) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// `Processing -> Failed`, recording the error.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                job_id: self.job_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = epoch_seconds();
        Ok(())
    }
}

/// Minimal task reference carried by the work queue.
///
/// The full record lives in the task store; the reference only carries what a
/// worker needs to resolve and invoke the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub job_id: JobId,
    pub task_type: String,
    #[serde(default)]
    pub arguments: TaskArguments,
}
