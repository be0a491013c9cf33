//! Grab a single frame as a JPEG.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};
use vapi_models::TaskArguments;
use vapi_queue::{TaskContext, TaskHandler};

use super::args::{optional_f64, optional_u32, required_str};
use super::MediaContext;
use crate::command::FfmpegCommand;
use crate::error::MediaError;
use crate::probe::probe_media;

/// Map a 1-100 quality to FFmpeg's JPEG quality scale (2 best, 31 worst).
fn quality_scale(quality: u32) -> u8 {
    let q = 31.0 - f64::from(quality.min(100)) / 3.45;
    q.round().clamp(2.0, 31.0) as u8
}

/// Requested seek time, falling back to the midpoint when it is past the end.
fn seek_time(requested: f64, duration: f64) -> f64 {
    if requested > duration {
        duration / 2.0
    } else {
        requested
    }
}

fn build_command(input: &Path, time: f64, width: u32, height: u32, quality: u32, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_with_args(["-ss".to_string(), format!("{time:.3}")], input)
        .single_frame()
        .video_filter(format!("scale={width}:{height}:force_original_aspect_ratio=decrease"))
        .quality_scale(quality_scale(quality))
}

pub struct ThumbnailHandler {
    ctx: Arc<MediaContext>,
}

impl ThumbnailHandler {
    pub fn new(ctx: Arc<MediaContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskHandler for ThumbnailHandler {
    async fn run(&self, task: TaskContext, args: TaskArguments) -> anyhow::Result<Value> {
        let video_url = required_str(&args, "video_url")?;
        let time = optional_f64(&args, "time", 0.0)?;
        if time < 0.0 {
            return Err(MediaError::invalid_argument("time must not be negative").into());
        }
        let width = optional_u32(&args, "width", 640)?;
        let height = optional_u32(&args, "height", 360)?;
        if width == 0 || height == 0 {
            return Err(MediaError::invalid_argument("width and height must be positive").into());
        }
        let quality = optional_u32(&args, "quality", 90)?;
        if !(1..=100).contains(&quality) {
            return Err(MediaError::invalid_argument("quality must be between 1 and 100").into());
        }

        let workspace = self.ctx.workspace(&task.job_id).await?;
        let dir = workspace.path();
        let video = self.ctx.downloader.download(video_url, dir, "video").await?;

        let info = probe_media(&video).await?;
        if info.duration <= 0.0 {
            return Err(MediaError::InvalidMedia("could not determine video duration".into()).into());
        }
        let at = seek_time(time, info.duration);
        if at != time {
            warn!(job_id = %task.job_id, requested = time, adjusted = at, "Seek time past end of video");
        }
        info!(job_id = %task.job_id, time = at, "Input downloaded, extracting frame");

        let output = dir.join("thumbnail.jpg");
        let cmd = build_command(&video, at, width, height, quality, &output);
        self.ctx.runner.run(&cmd).await?;

        Ok(self.ctx.publish(&task.job_id, &output).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_scale() {
        assert_eq!(quality_scale(100), 2);
        assert_eq!(quality_scale(90), 5);
        assert_eq!(quality_scale(1), 31);
    }

    #[test]
    fn test_seek_time_past_end_uses_midpoint() {
        assert_eq!(seek_time(3.0, 10.0), 3.0);
        assert_eq!(seek_time(12.0, 10.0), 5.0);
    }

    #[test]
    fn test_command() {
        let args = build_command(Path::new("v.mp4"), 1.5, 320, 180, 90, Path::new("t.jpg")).build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ss 1.500 -i v.mp4"));
        assert!(joined.contains("-vf scale=320:180:force_original_aspect_ratio=decrease"));
        assert!(joined.contains("-q:v 5"));
        assert!(joined.ends_with("t.jpg"));
    }
}
