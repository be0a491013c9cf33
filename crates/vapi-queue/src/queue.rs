//! FIFO work queue of pending task references.
//!
//! References are left-pushed and right-popped. The broker's atomic pop is the
//! only thing preventing two workers from taking the same task.

use std::sync::Arc;

use vapi_models::TaskRef;

use crate::broker::BrokerManager;
use crate::error::QueueResult;

#[derive(Clone)]
pub struct WorkQueue {
    broker: Arc<BrokerManager>,
    name: String,
}

impl WorkQueue {
    pub fn new(broker: Arc<BrokerManager>, name: impl Into<String>) -> Self {
        Self {
            broker,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a reference to the tail of the queue.
    pub async fn push(&self, task: &TaskRef) -> QueueResult<()> {
        let value = serde_json::to_string(task)?;
        let (name, value) = (self.name.as_str(), value.as_str());
        self.broker
            .execute("push", |conn| async move { conn.push_left(name, value).await })
            .await
    }

    /// Remove and return the oldest reference, if any.
    ///
    /// An entry that fails to parse has already been removed from the queue and
    /// is reported as an error.
    pub async fn pop(&self) -> QueueResult<Option<TaskRef>> {
        let name = self.name.as_str();
        let raw = self
            .broker
            .execute("pop", |conn| async move { conn.pop_right(name).await })
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Number of references waiting.
    pub async fn len(&self) -> QueueResult<u64> {
        let name = self.name.as_str();
        self.broker
            .execute("queue_length", |conn| async move { conn.list_len(name).await })
            .await
    }

    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::memory::MemoryBroker;
    use crate::store::BrokerConnector;
    use std::collections::HashMap;
    use vapi_models::{JobId, TaskArguments};

    fn queue(broker: &MemoryBroker) -> WorkQueue {
        let manager = BrokerManager::new(Arc::new(broker.clone()), BrokerConfig::default());
        WorkQueue::new(Arc::new(manager), "test:queue")
    }

    fn task_ref(id: &str) -> TaskRef {
        TaskRef {
            job_id: JobId::from(id),
            task_type: "generate_thumbnail".to_string(),
            arguments: TaskArguments::new(),
        }
    }

    #[tokio::test]
    async fn test_fifo_for_single_producer() {
        let queue = queue(&MemoryBroker::new());
        for id in ["1", "2", "3"] {
            queue.push(&task_ref(id)).await.unwrap();
        }
        assert_eq!(queue.len().await.unwrap(), 3);

        for id in ["1", "2", "3"] {
            assert_eq!(queue.pop().await.unwrap().unwrap().job_id.as_str(), id);
        }
        assert!(queue.pop().await.unwrap().is_none());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_pops_deliver_each_reference_once() {
        let broker = MemoryBroker::new();
        let producer = queue(&broker);
        for i in 0..200 {
            producer.push(&task_ref(&i.to_string())).await.unwrap();
        }

        // One manager per consumer, sharing nothing but the broker
        let consumers: Vec<_> = (0..8)
            .map(|_| {
                let consumer = queue(&broker);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(task) = consumer.pop().await.unwrap() {
                        seen.push(task.job_id);
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        let mut counts: HashMap<JobId, usize> = HashMap::new();
        for consumer in consumers {
            for id in consumer.await.unwrap() {
                *counts.entry(id).or_default() += 1;
            }
        }
        assert_eq!(counts.len(), 200);
        assert!(counts.values().all(|&n| n == 1));
    }

    #[tokio::test]
    async fn test_pop_survives_dropped_connection() {
        let broker = MemoryBroker::new();
        let queue = queue(&broker);
        queue.push(&task_ref("a")).await.unwrap();

        broker.sever_connections();
        assert_eq!(queue.pop().await.unwrap().unwrap().job_id.as_str(), "a");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let broker = MemoryBroker::new();
        let queue = queue(&broker);
        let conn = broker.connect().await.unwrap();
        conn.push_left("test:queue", "{oops").await.unwrap();

        assert!(queue.pop().await.is_err());
        assert!(queue.is_empty().await.unwrap());
    }
}
