//! Media task handlers.
//!
//! Every handler follows the same shape: download inputs into a per-task
//! scratch directory, run FFmpeg, check the output, copy it into storage and
//! return `{"url": <public url>}`. The scratch directory is removed when the
//! handler returns, whatever the outcome.

mod args;
mod audio;
mod captions;
mod concat;
mod overlay;
mod thumbnail;

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use tracing::info;
use vapi_models::{JobId, TaskType};
use vapi_queue::TaskRegistry;
use vapi_storage::LocalStorage;

use crate::command::FfmpegRunner;
use crate::config::MediaConfig;
use crate::download::Downloader;
use crate::error::{MediaError, MediaResult};

pub use audio::ExtractAudioHandler;
pub use captions::CaptionsHandler;
pub use concat::ConcatenateHandler;
pub use overlay::OverlayHandler;
pub use thumbnail::ThumbnailHandler;

/// Legacy name some producers still enqueue overlay tasks under.
pub const MEME_OVERLAY_ALIAS: &str = "process_meme_overlay";

/// Collaborators shared by all media handlers.
pub struct MediaContext {
    pub config: MediaConfig,
    pub downloader: Downloader,
    pub runner: FfmpegRunner,
    pub storage: LocalStorage,
}

impl MediaContext {
    pub fn new(config: MediaConfig, storage: LocalStorage) -> MediaResult<Self> {
        let downloader = Downloader::new(config.download_timeout)?;
        let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout);
        Ok(Self {
            config,
            downloader,
            runner,
            storage,
        })
    }

    /// Fresh scratch directory for one task, deleted on drop.
    pub(crate) async fn workspace(&self, job_id: &JobId) -> MediaResult<TempDir> {
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let prefix: String = job_id
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .take(64)
            .collect();
        Ok(tempfile::Builder::new()
            .prefix(&format!("{prefix}_"))
            .tempdir_in(&self.config.temp_dir)?)
    }

    /// Verify `output` and copy it into storage.
    pub(crate) async fn publish(&self, job_id: &JobId, output: &Path) -> MediaResult<Value> {
        verify_output(output).await?;
        let url = self.storage.store_file(output).await?;
        info!(job_id = %job_id, url = %url, "Stored task output");
        Ok(json!({ "url": url }))
    }
}

/// An FFmpeg output must exist and be non-empty.
async fn verify_output(path: &Path) -> MediaResult<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::invalid_output(format!("{} was not produced", path.display())))?;
    if meta.len() == 0 {
        return Err(MediaError::invalid_output(format!("{} is empty", path.display())));
    }
    Ok(())
}

/// Register a handler for every catalogued task type.
pub fn register_media_handlers(registry: &mut TaskRegistry, ctx: Arc<MediaContext>) {
    for task_type in TaskType::ALL {
        let name = task_type.as_str();
        match task_type {
            TaskType::AddCaptionsToVideo => {
                registry.register(name, CaptionsHandler::new(Arc::clone(&ctx)));
            }
            TaskType::OverlayImageOnVideo => {
                registry.register(name, OverlayHandler::new(Arc::clone(&ctx)));
                registry.register(MEME_OVERLAY_ALIAS, OverlayHandler::new(Arc::clone(&ctx)));
            }
            TaskType::ConcatenateVideos => {
                registry.register(name, ConcatenateHandler::new(Arc::clone(&ctx)));
            }
            TaskType::ExtractAudio => {
                registry.register(name, ExtractAudioHandler::new(Arc::clone(&ctx)));
            }
            TaskType::GenerateThumbnail => {
                registry.register(name, ThumbnailHandler::new(Arc::clone(&ctx)));
            }
        }
    }
}
