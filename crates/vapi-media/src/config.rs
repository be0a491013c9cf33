//! Media processing configuration.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Scratch directory for downloads and intermediate outputs
    pub temp_dir: PathBuf,
    /// Upper bound for a single FFmpeg run
    pub ffmpeg_timeout: Duration,
    /// Upper bound for a single input download
    pub download_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("./temp"),
            ffmpeg_timeout: Duration::from_secs(3600),
            download_timeout: Duration::from_secs(300),
        }
    }
}

impl MediaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./temp")),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            download_timeout: Duration::from_secs(
                std::env::var("DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }
}
