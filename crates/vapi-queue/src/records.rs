//! Task record store.
//!
//! Records are stored whole, as JSON, under `<prefix><job_id>`. There are no
//! partial-field writes: callers read, modify and put back the full record.

use std::sync::Arc;

use tracing::warn;
use vapi_models::{JobId, StatusCounts, TaskRecord};

use crate::broker::BrokerManager;
use crate::error::QueueResult;

#[derive(Clone)]
pub struct TaskStore {
    broker: Arc<BrokerManager>,
    prefix: String,
}

impl TaskStore {
    pub fn new(broker: Arc<BrokerManager>, prefix: impl Into<String>) -> Self {
        Self {
            broker,
            prefix: prefix.into(),
        }
    }

    /// Broker key holding the record for `job_id`.
    pub fn key(&self, job_id: &JobId) -> String {
        format!("{}{}", self.prefix, job_id)
    }

    /// Create or overwrite the full record.
    pub async fn put(&self, record: &TaskRecord) -> QueueResult<()> {
        let key = self.key(&record.job_id);
        let value = serde_json::to_string(record)?;
        let (key, value) = (key.as_str(), value.as_str());
        self.broker
            .execute("put_task", |conn| async move { conn.set(key, value).await })
            .await
    }

    /// Fetch a record. `Ok(None)` means the task does not exist; an unreachable
    /// broker is always an error.
    pub async fn get(&self, job_id: &JobId) -> QueueResult<Option<TaskRecord>> {
        let key = self.key(job_id);
        let key = key.as_str();
        let raw = self
            .broker
            .execute("get_task", |conn| async move { conn.get(key).await })
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Every record under the prefix.
    ///
    /// Keys that vanish between listing and reading are skipped, as are
    /// records that fail to parse.
    pub async fn list_by_prefix(&self) -> QueueResult<Vec<TaskRecord>> {
        let prefix = self.prefix.as_str();
        let keys = self
            .broker
            .execute("list_tasks", |conn| async move {
                conn.keys_with_prefix(prefix).await
            })
            .await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in &keys {
            let key = key.as_str();
            let raw = self
                .broker
                .execute("get_task", |conn| async move { conn.get(key).await })
                .await?;
            let Some(json) = raw else { continue };
            match serde_json::from_str::<TaskRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key, error = %e, "Skipping unreadable task record"),
            }
        }
        Ok(records)
    }

    /// Count records grouped by status.
    pub async fn count_by_status(&self) -> QueueResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for record in self.list_by_prefix().await? {
            counts.record(record.status);
        }
        Ok(counts)
    }
}
