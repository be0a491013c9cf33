//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use vapi_media::{MediaConfig, MediaInspector};
use vapi_queue::{BrokerConfig, TaskService};
use vapi_storage::StorageConfig;

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub tasks: TaskService,
    /// Directory served under `/storage`
    pub storage_root: PathBuf,
    pub media: MediaInspector,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        tasks: TaskService,
        storage_root: impl Into<PathBuf>,
        media: MediaInspector,
    ) -> Self {
        Self {
            config: Arc::new(config),
            tasks,
            storage_root: storage_root.into(),
            media,
        }
    }

    /// Build state from environment configuration.
    ///
    /// The broker is connected lazily on first use, so this succeeds even
    /// while the broker is down.
    pub fn from_env(config: ApiConfig) -> ApiResult<Self> {
        let tasks = TaskService::from_config(BrokerConfig::from_env())?;
        let storage = StorageConfig::from_env();
        let media = MediaInspector::new(&MediaConfig::from_env())?;
        Ok(Self::new(config, tasks, storage.root, media))
    }
}
