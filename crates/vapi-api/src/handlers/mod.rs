//! HTTP handlers.

pub mod health;
pub mod jobs;
pub mod media;
pub mod system;
pub mod tasks;

pub use health::{health, ready};
