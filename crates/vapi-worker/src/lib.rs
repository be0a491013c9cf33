//! Task worker.
//!
//! This crate provides:
//! - Worker loops that dequeue, execute and record tasks
//! - A pool running several independent loops
//! - Webhook notification of terminal task status
//! - Status-write retry and consecutive-error backoff
//! - Cooperative shutdown through a cancellation token

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod webhook;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{Iteration, WorkerLoop, WorkerPool};
pub use logging::TaskLogger;
pub use webhook::{DeliveryReport, WebhookConfig, WebhookNotifier};
