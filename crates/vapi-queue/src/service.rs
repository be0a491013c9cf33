//! Submission and status service.
//!
//! Ties the task store and the work queue together. Submission writes the
//! record before pushing the reference so a worker never pops a reference
//! without a record behind it. Status transitions are read-modify-write of the
//! whole record through the state machine in [`TaskRecord`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use vapi_models::{
    JobId, QueueStats, TaskArguments, TaskRecord, TaskStatus, TransitionError,
};

use crate::broker::BrokerManager;
use crate::config::BrokerConfig;
use crate::error::{QueueError, QueueResult};
use crate::queue::WorkQueue;
use crate::records::TaskStore;

/// A task submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub task_type: String,
    pub job_id: Option<JobId>,
    pub arguments: TaskArguments,
    pub callback_address: Option<String>,
}

impl SubmitRequest {
    pub fn new(task_type: impl Into<String>, arguments: TaskArguments) -> Self {
        Self {
            task_type: task_type.into(),
            arguments,
            ..Default::default()
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<JobId>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_callback(mut self, address: impl Into<String>) -> Self {
        self.callback_address = Some(address.into());
        self
    }
}

/// Returned to the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    pub status: TaskStatus,
    pub created_at: f64,
}

#[derive(Clone)]
pub struct TaskService {
    broker: Arc<BrokerManager>,
    store: TaskStore,
    queue: WorkQueue,
}

impl TaskService {
    pub fn new(broker: Arc<BrokerManager>) -> Self {
        let config = broker.config();
        let store = TaskStore::new(Arc::clone(&broker), config.task_key_prefix.clone());
        let queue = WorkQueue::new(Arc::clone(&broker), config.queue_name.clone());
        Self {
            broker,
            store,
            queue,
        }
    }

    /// Build a service with its own broker manager.
    pub fn from_config(config: BrokerConfig) -> QueueResult<Self> {
        Ok(Self::new(Arc::new(BrokerManager::from_config(config)?)))
    }

    pub fn broker(&self) -> &Arc<BrokerManager> {
        &self.broker
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Persist a new task and enqueue it.
    ///
    /// Task types are not checked here; a type with no registered handler
    /// fails when a worker dequeues it.
    pub async fn submit(&self, request: SubmitRequest) -> QueueResult<SubmitReceipt> {
        if request.task_type.trim().is_empty() {
            return Err(QueueError::invalid_request("task_type must not be empty"));
        }

        let job_id = match request.job_id {
            Some(id) if id.as_str().trim().is_empty() => {
                return Err(QueueError::invalid_request("job id must not be empty"));
            }
            Some(id) => {
                if self.store.get(&id).await?.is_some() {
                    return Err(QueueError::DuplicateJobId(id.to_string()));
                }
                id
            }
            None => JobId::new(),
        };

        let record = TaskRecord::new(
            job_id,
            request.task_type,
            request.arguments,
            request.callback_address,
        );
        self.store.put(&record).await?;
        self.queue.push(&record.to_ref()).await?;

        info!(
            job_id = %record.job_id,
            task_type = %record.task_type,
            has_callback = record.callback_address.is_some(),
            "Task submitted"
        );

        Ok(SubmitReceipt {
            job_id: record.job_id,
            status: record.status,
            created_at: record.created_at,
        })
    }

    /// Latest persisted snapshot of a task.
    pub async fn get_status(&self, job_id: &JobId) -> QueueResult<Option<TaskRecord>> {
        self.store.get(job_id).await
    }

    pub async fn get_queue_stats(&self) -> QueueResult<QueueStats> {
        let queue_length = self.queue.len().await?;
        let tasks_by_status = self.store.count_by_status().await?;
        let total_tasks = TaskStatus::ALL
            .iter()
            .map(|status| tasks_by_status.get(*status))
            .sum();

        Ok(QueueStats {
            queue_length,
            total_tasks,
            tasks_by_status,
        })
    }

    /// `Queued -> Processing`.
    pub async fn mark_processing(&self, job_id: &JobId) -> QueueResult<TaskRecord> {
        self.transition(job_id, |record| record.start_processing())
            .await
    }

    /// `Processing -> Completed` with `result`.
    pub async fn mark_completed(&self, job_id: &JobId, result: Value) -> QueueResult<TaskRecord> {
        self.transition(job_id, move |record| record.complete(result))
            .await
    }

    /// `Processing -> Failed` with `error`.
    pub async fn mark_failed(
        &self,
        job_id: &JobId,
        error: impl Into<String>,
    ) -> QueueResult<TaskRecord> {
        let error = error.into();
        self.transition(job_id, move |record| record.fail(error))
            .await
    }

    async fn transition<F>(&self, job_id: &JobId, apply: F) -> QueueResult<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord) -> Result<(), TransitionError>,
    {
        let mut record = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| QueueError::task_not_found(job_id.as_str()))?;
        let from = record.status;
        apply(&mut record)?;
        self.store.put(&record).await?;
        debug!(job_id = %job_id, from = %from, to = %record.status, "Task status updated");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> BrokerConfig {
        BrokerConfig {
            url: "memory://".to_string(),
            retry_attempts: 5,
            retry_backoff: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn service(broker: &MemoryBroker) -> TaskService {
        TaskService::new(Arc::new(BrokerManager::new(
            Arc::new(broker.clone()),
            config(),
        )))
    }

    fn args() -> TaskArguments {
        let mut args = TaskArguments::new();
        args.insert("video_url".into(), json!("https://cdn.example.com/in.mp4"));
        args.insert("time".into(), json!(1.5));
        args
    }

    #[tokio::test]
    async fn test_submit_then_status_is_queued() {
        let service = service(&MemoryBroker::new());
        let receipt = service
            .submit(SubmitRequest::new("generate_thumbnail", args()))
            .await
            .unwrap();
        assert_eq!(receipt.status, TaskStatus::Queued);

        let task = service.get_status(&receipt.job_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.result.is_none());
        assert!(task.error.is_none());
        assert_eq!(task.arguments, args());
        assert_eq!(task.created_at, receipt.created_at);
        assert_eq!(service.queue().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_keeps_caller_job_id_and_callback() {
        let service = service(&MemoryBroker::new());
        let receipt = service
            .submit(
                SubmitRequest::new("extract_audio", args())
                    .with_job_id("my-job")
                    .with_callback("http://hooks.local/done"),
            )
            .await
            .unwrap();
        assert_eq!(receipt.job_id.as_str(), "my-job");

        let task = service.get_status(&receipt.job_id).await.unwrap().unwrap();
        assert_eq!(task.callback_address.as_deref(), Some("http://hooks.local/done"));

        let queued = service.queue().pop().await.unwrap().unwrap();
        assert_eq!(queued.job_id.as_str(), "my-job");
        assert_eq!(queued.task_type, "extract_audio");
    }

    #[tokio::test]
    async fn test_submit_rejects_duplicate_job_id() {
        let service = service(&MemoryBroker::new());
        let request = SubmitRequest::new("extract_audio", args()).with_job_id("dup");
        service.submit(request.clone()).await.unwrap();

        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, QueueError::DuplicateJobId(id) if id == "dup"));
        assert_eq!(service.queue().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_task_type() {
        let service = service(&MemoryBroker::new());
        let err = service
            .submit(SubmitRequest::new("  ", args()))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_submit_accepts_unregistered_task_type() {
        let service = service(&MemoryBroker::new());
        let receipt = service
            .submit(SubmitRequest::new("does_not_exist", TaskArguments::new()))
            .await
            .unwrap();
        assert_eq!(receipt.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_submit_survives_initial_outage() {
        let broker = MemoryBroker::new();
        broker.fail_next_connects(2);
        let service = service(&broker);

        let receipt = service
            .submit(SubmitRequest::new("extract_audio", args()))
            .await
            .unwrap();
        assert_eq!(broker.connect_attempts(), 3);
        assert!(service.get_status(&receipt.job_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_fails_when_outage_outlasts_budget() {
        let broker = MemoryBroker::new();
        broker.fail_next_connects(100);
        let service = service(&broker);

        let err = service
            .submit(SubmitRequest::new("extract_audio", args()))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(broker.connect_attempts(), 5);
    }

    #[tokio::test]
    async fn test_transitions_through_service() {
        let service = service(&MemoryBroker::new());
        let receipt = service
            .submit(SubmitRequest::new("extract_audio", args()))
            .await
            .unwrap();

        let task = service.mark_processing(&receipt.job_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Processing);

        let task = service
            .mark_completed(&receipt.job_id, json!({"url": "http://x/a.mp3"}))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());

        let err = service
            .mark_failed(&receipt.job_id, "late failure")
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition(_)));

        let first = service.get_status(&receipt.job_id).await.unwrap();
        let second = service.get_status(&receipt.job_id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.unwrap().error, None);
    }

    #[tokio::test]
    async fn test_transition_of_missing_task() {
        let service = service(&MemoryBroker::new());
        let err = service
            .mark_processing(&JobId::from("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_queue_stats() {
        let service = service(&MemoryBroker::new());
        let mut ids = Vec::new();
        for _ in 0..3 {
            let receipt = service
                .submit(SubmitRequest::new("extract_audio", args()))
                .await
                .unwrap();
            ids.push(receipt.job_id);
        }

        // Two workers take the first two tasks off the queue
        for id in &ids[..2] {
            let popped = service.queue().pop().await.unwrap().unwrap();
            assert_eq!(&popped.job_id, id);
            service.mark_processing(id).await.unwrap();
        }
        service.mark_completed(&ids[0], json!("ok")).await.unwrap();
        service.mark_failed(&ids[1], "bad input").await.unwrap();

        let stats = service.get_queue_stats().await.unwrap();
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.queue_length, 1);
        assert_eq!(stats.tasks_by_status.queued, 1);
        assert_eq!(stats.tasks_by_status.processing, 0);
        assert_eq!(stats.tasks_by_status.completed, 1);
        assert_eq!(stats.tasks_by_status.failed, 1);
    }
}
