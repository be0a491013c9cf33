//! FFmpeg CLI wrapper and the media task handlers.
//!
//! This crate provides:
//! - An FFmpeg command builder and a runner with timeout and progress parsing
//! - FFprobe media inspection, locally or of a remote URL
//! - HTTP input downloads
//! - Task handlers for captions, overlays, concatenation, audio extraction
//!   and thumbnails, registered by task type name

pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod handlers;
pub mod inspect;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use config::MediaConfig;
pub use download::Downloader;
pub use error::{MediaError, MediaResult};
pub use handlers::{register_media_handlers, MediaContext};
pub use inspect::MediaInspector;
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
