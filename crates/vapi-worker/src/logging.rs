//! Structured task logging.
//!
//! Every line carries the job ID and task type so a task's lifecycle can be
//! followed across worker loops.

use tracing::{error, info, warn, Span};
use vapi_models::JobId;

/// Logger bound to one task.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    worker: String,
    job_id: String,
    task_type: String,
}

impl TaskLogger {
    pub fn new(worker: &str, job_id: &JobId, task_type: &str) -> Self {
        Self {
            worker: worker.to_string(),
            job_id: job_id.to_string(),
            task_type: task_type.to_string(),
        }
    }

    pub fn log_start(&self) {
        info!(
            worker = %self.worker,
            job_id = %self.job_id,
            task_type = %self.task_type,
            "Task started"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            worker = %self.worker,
            job_id = %self.job_id,
            task_type = %self.task_type,
            "Task warning: {}", message
        );
    }

    pub fn log_failure(&self, message: &str, elapsed_secs: f64) {
        error!(
            worker = %self.worker,
            job_id = %self.job_id,
            task_type = %self.task_type,
            elapsed_secs,
            "Task failed: {}", message
        );
    }

    pub fn log_completion(&self, elapsed_secs: f64) {
        info!(
            worker = %self.worker,
            job_id = %self.job_id,
            task_type = %self.task_type,
            elapsed_secs,
            "Task completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Span wrapping the handler invocation, so handler logs inherit the task fields.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "task",
            worker = %self.worker,
            job_id = %self.job_id,
            task_type = %self.task_type
        )
    }
}
