//! Worker loop and pool.
//!
//! Each loop owns its own broker connection and processes one task at a time:
//! pop a reference, mark it processing, run the handler, record the outcome,
//! then notify the callback address. Cancellation is observed only between
//! iterations, so a task that has been popped always reaches a terminal write
//! attempt before the loop exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use vapi_models::{JobId, TaskRecord, TaskRef, TaskStatus, WebhookEvent};
use vapi_queue::{
    BrokerConfig, BrokerConnector, BrokerManager, QueueError, TaskContext, TaskRegistry,
    TaskService,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::metrics;
use crate::retry::{already_applied, sleep_or_cancel, ConsecutiveErrors, StatusWriteRetry};
use crate::webhook::WebhookNotifier;

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iteration {
    /// The queue was empty.
    Idle,
    /// A task ran to a terminal status.
    Processed { job_id: JobId, status: TaskStatus },
    /// The reference had no queued record behind it and was dropped.
    Skipped(JobId),
}

/// A single worker loop.
pub struct WorkerLoop {
    id: String,
    service: TaskService,
    registry: Arc<TaskRegistry>,
    notifier: WebhookNotifier,
    config: WorkerConfig,
    status_retry: StatusWriteRetry,
}

impl WorkerLoop {
    pub fn new(
        id: impl Into<String>,
        service: TaskService,
        registry: Arc<TaskRegistry>,
        notifier: WebhookNotifier,
        config: WorkerConfig,
    ) -> Self {
        let status_retry =
            StatusWriteRetry::new(config.status_write_attempts, config.reconnect_interval);
        Self {
            id: id.into(),
            service,
            registry,
            notifier,
            config,
            status_retry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Poll until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        info!(
            worker = %self.id,
            queue = %self.service.queue().name(),
            "Worker loop started"
        );
        let mut errors = ConsecutiveErrors::new(self.config.max_consecutive_errors);

        while !token.is_cancelled() {
            let pause = match self.run_once().await {
                Ok(Iteration::Idle) => {
                    errors.record_success();
                    Some(self.config.poll_interval)
                }
                Ok(_) => {
                    errors.record_success();
                    None
                }
                Err(e) => {
                    let transient = e.is_transient();
                    metrics::record_worker_error(if transient { "broker" } else { "internal" });

                    if errors.record_failure() {
                        error!(
                            worker = %self.id,
                            error = %e,
                            backoff_secs = self.config.error_backoff().as_secs(),
                            "Too many consecutive errors, backing off"
                        );
                        Some(self.config.error_backoff())
                    } else if transient {
                        warn!(worker = %self.id, error = %e, "Broker unavailable, waiting to reconnect");
                        Some(self.config.reconnect_interval)
                    } else {
                        error!(worker = %self.id, error = %e, "Worker iteration failed");
                        Some(self.config.poll_interval)
                    }
                }
            };

            if let Some(pause) = pause {
                if !sleep_or_cancel(pause, &token).await {
                    break;
                }
            }
        }

        info!(worker = %self.id, "Worker loop stopped");
    }

    /// Pop and fully process at most one task.
    pub async fn run_once(&self) -> WorkerResult<Iteration> {
        match self.service.queue().pop().await? {
            Some(task) => self.process(task).await,
            None => Ok(Iteration::Idle),
        }
    }

    async fn process(&self, task: TaskRef) -> WorkerResult<Iteration> {
        let logger = TaskLogger::new(&self.id, &task.job_id, &task.task_type);
        let job_id = task.job_id;

        let Some(record) = self.claim(&job_id, &logger).await? else {
            return Ok(Iteration::Skipped(job_id));
        };

        logger.log_start();
        let started = Instant::now();
        let outcome = self.execute(&record, &logger).await;
        let elapsed = started.elapsed().as_secs_f64();

        let status = match &outcome {
            Ok(_) => {
                logger.log_completion(elapsed);
                TaskStatus::Completed
            }
            Err(message) => {
                logger.log_failure(message, elapsed);
                TaskStatus::Failed
            }
        };
        metrics::record_task(&record.task_type, status.as_str(), elapsed);

        let written = match &outcome {
            Ok(value) => self
                .status_retry
                .run("mark_completed", || {
                    self.service.mark_completed(&job_id, value.clone())
                })
                .await
                .map(|_| ()),
            Err(message) => self
                .status_retry
                .run("mark_failed", || self.service.mark_failed(&job_id, message.clone()))
                .await
                .map(|_| ()),
        };
        let written = match written {
            Err(e) if already_applied(&e, status) => {
                debug!(job_id = %job_id, status = %status, "Terminal status already recorded");
                Ok(())
            }
            other => other,
        };

        // The caller learns the outcome even if the record write was lost.
        if let Some(address) = record.callback_address.as_deref() {
            let event = match outcome {
                Ok(value) => WebhookEvent::completed(job_id.clone(), value),
                Err(message) => WebhookEvent::failed(job_id.clone(), message),
            };
            self.notifier.notify(address, &event).await;
        }

        written.map_err(|e| WorkerError::status_write(job_id.as_str(), status, e))?;
        Ok(Iteration::Processed { job_id, status })
    }

    /// Move the record to `Processing`, or `None` if it is not ours to run.
    ///
    /// A retried write that finds the record already `Processing` means an
    /// earlier attempt landed and only its reply was lost.
    async fn claim(
        &self,
        job_id: &JobId,
        logger: &TaskLogger,
    ) -> WorkerResult<Option<TaskRecord>> {
        let interrupted = AtomicBool::new(false);
        let written = {
            let interrupted = &interrupted;
            self.status_retry
                .run("mark_processing", || async move {
                    let result = self.service.mark_processing(job_id).await;
                    if matches!(&result, Err(e) if e.is_transient()) {
                        interrupted.store(true, Ordering::SeqCst);
                    }
                    result
                })
                .await
        };

        match written {
            Ok(record) => Ok(Some(record)),
            Err(e)
                if interrupted.load(Ordering::SeqCst)
                    && already_applied(&e, TaskStatus::Processing) =>
            {
                debug!(job_id = %job_id, "Processing write landed before the connection dropped");
                let record = self
                    .status_retry
                    .run("get_status", || self.service.get_status(job_id))
                    .await
                    .map_err(|e| {
                        WorkerError::status_write(job_id.as_str(), TaskStatus::Processing, e)
                    })?;
                match record {
                    Some(record) => Ok(Some(record)),
                    None => {
                        logger.log_warning("record vanished after the processing write, skipping");
                        Ok(None)
                    }
                }
            }
            Err(QueueError::TaskNotFound(_)) | Err(QueueError::InvalidTransition(_)) => {
                logger.log_warning("no queued record behind the reference, skipping");
                Ok(None)
            }
            Err(e) => Err(WorkerError::status_write(
                job_id.as_str(),
                TaskStatus::Processing,
                e,
            )),
        }
    }

    /// Run the registered handler, turning every failure into a message.
    async fn execute(&self, record: &TaskRecord, logger: &TaskLogger) -> Result<Value, String> {
        let Some(handler) = self.registry.resolve(&record.task_type) else {
            return Err(format!("Unknown task type: {}", record.task_type));
        };

        let ctx = TaskContext {
            job_id: record.job_id.clone(),
            callback_address: record.callback_address.clone(),
        };
        let args = record.arguments.clone();

        // Spawned so a panicking handler cannot take the loop down with it.
        let handle =
            tokio::spawn(async move { handler.run(ctx, args).await }.instrument(logger.create_span()));

        match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(e) if e.is_panic() => Err("Task handler panicked".to_string()),
            Err(e) => Err(format!("Task handler aborted: {e}")),
        }
    }
}

/// Runs `concurrency` independent worker loops.
pub struct WorkerPool {
    config: WorkerConfig,
    broker_config: BrokerConfig,
    connector: Arc<dyn BrokerConnector>,
    registry: Arc<TaskRegistry>,
    notifier: WebhookNotifier,
}

impl WorkerPool {
    pub fn new(
        config: WorkerConfig,
        broker_config: BrokerConfig,
        connector: Arc<dyn BrokerConnector>,
        registry: Arc<TaskRegistry>,
        notifier: WebhookNotifier,
    ) -> Self {
        Self {
            config,
            broker_config,
            connector,
            registry,
            notifier,
        }
    }

    /// Build one loop. Each gets its own broker manager, so a reconnect in
    /// one loop never stalls the others.
    fn worker(&self, index: usize) -> WorkerLoop {
        let broker = Arc::new(BrokerManager::new(
            Arc::clone(&self.connector),
            self.broker_config.clone(),
        ));
        WorkerLoop::new(
            format!("worker-{index}"),
            TaskService::new(broker),
            Arc::clone(&self.registry),
            self.notifier.clone(),
            self.config.clone(),
        )
    }

    /// Run every loop until `token` is cancelled and all of them have drained.
    pub async fn run(self, token: CancellationToken) {
        let concurrency = self.config.concurrency.max(1);
        let mut loops = JoinSet::new();
        for index in 0..concurrency {
            let worker = self.worker(index);
            let token = token.clone();
            loops.spawn(async move { worker.run(token).await });
        }

        info!(
            concurrency,
            broker = %self.connector.describe(),
            handlers = ?self.registry.names(),
            "Worker pool started"
        );

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker loop terminated abnormally");
            }
        }

        info!("Worker pool stopped");
    }
}
