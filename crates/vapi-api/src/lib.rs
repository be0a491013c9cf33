//! Axum HTTP API server.
//!
//! This crate provides:
//! - Submission routes for every catalogued task type
//! - Job status polling and queue statistics
//! - API key authentication and security headers
//! - Static serving of stored artifacts
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
