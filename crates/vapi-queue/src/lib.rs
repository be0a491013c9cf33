//! Durable task queue backed by a key-value broker.
//!
//! This crate provides:
//! - A minimal broker contract (`BrokerConnection`) with Redis and in-memory backends
//! - Connection management with bounded exponential-backoff reconnect
//! - Task record storage and the FIFO work queue
//! - The task handler registry
//! - The submission/status service used by the HTTP layer and workers

pub mod broker;
pub mod config;
pub mod error;
pub mod memory;
pub mod queue;
pub mod records;
pub mod redis_broker;
pub mod registry;
pub mod service;
pub mod store;

pub use broker::BrokerManager;
pub use config::BrokerConfig;
pub use error::{QueueError, QueueResult};
pub use memory::MemoryBroker;
pub use queue::WorkQueue;
pub use records::TaskStore;
pub use redis_broker::RedisConnector;
pub use registry::{FnHandler, TaskContext, TaskHandler, TaskRegistry};
pub use service::{SubmitReceipt, SubmitRequest, TaskService};
pub use store::{BrokerConnection, BrokerConnector, StoreError, StoreResult};
