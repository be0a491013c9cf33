//! Local result storage.
//!
//! Produced artifacts are copied into a date-partitioned directory tree under
//! the storage root and exposed through a public media URL.

pub mod error;
pub mod local;

pub use error::{StorageError, StorageResult};
pub use local::{LocalStorage, StorageConfig};
