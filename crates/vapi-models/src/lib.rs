//! Shared data models for the media job service.
//!
//! This crate provides Serde-serializable types for:
//! - Task records and the status state machine
//! - Minimal queue references handed to workers
//! - Queue statistics
//! - Webhook notification payloads
//! - The catalog of task types the service knows how to run

pub mod job;
pub mod stats;
pub mod task;
pub mod timestamp;
pub mod webhook;

// Re-export common types
pub use job::{JobId, TaskType, UnknownTaskType};
pub use stats::{QueueStats, StatusCounts};
pub use task::{TaskArguments, TaskRecord, TaskRef, TaskStatus, TransitionError};
pub use timestamp::epoch_seconds;
pub use webhook::WebhookEvent;
