//! Broker primitives the queue is built on.
//!
//! The whole system needs only keyed get/set, a left-push and an atomic
//! right-pop on a list, list length, and key enumeration by prefix. Anything
//! that can provide these (Redis, an in-process map) can back the queue.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a broker backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The broker could not be reached or the connection broke.
    #[error("Broker connection error: {0}")]
    Connectivity(String),

    /// The broker answered but rejected the command.
    #[error("Broker command error: {0}")]
    Command(String),
}

impl StoreError {
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Connectivity(_))
    }
}

/// A live handle to the broker.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Create or overwrite a keyed value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Read a keyed value. A missing key is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Push onto the head of a list.
    async fn push_left(&self, list: &str, value: &str) -> StoreResult<()>;

    /// Atomically remove and return the tail of a list.
    ///
    /// Two concurrent callers never receive the same element.
    async fn pop_right(&self, list: &str) -> StoreResult<Option<String>>;

    /// Number of elements in a list (0 when absent).
    async fn list_len(&self, list: &str) -> StoreResult<u64>;

    /// All keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Round-trip health check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Produces fresh broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> StoreResult<Arc<dyn BrokerConnection>>;

    /// Human-readable target for logs, without credentials.
    fn describe(&self) -> String;
}
