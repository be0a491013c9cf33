//! Overlay an image on a video.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use vapi_models::TaskArguments;
use vapi_queue::{TaskContext, TaskHandler};

use super::args::{optional_f64, optional_str, required_str, required_str_any};
use super::MediaContext;
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Distance from the frame edge for corner placements, in pixels.
const MARGIN: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    /// FFmpeg overlay expressions for x and y
    Custom { x: String, y: String },
}

impl OverlayPosition {
    /// `(x, y)` expressions for the overlay filter. `W/H` are the video size,
    /// `w/h` the already scaled overlay.
    fn expressions(&self) -> (String, String) {
        let far_x = format!("W-w-{MARGIN}");
        let far_y = format!("H-h-{MARGIN}");
        let near = MARGIN.to_string();
        match self {
            OverlayPosition::TopLeft => (near.clone(), near),
            OverlayPosition::TopRight => (far_x, near),
            OverlayPosition::BottomLeft => (near, far_y),
            OverlayPosition::BottomRight => (far_x, far_y),
            OverlayPosition::Center => ("(W-w)/2".to_string(), "(H-h)/2".to_string()),
            OverlayPosition::Custom { x, y } => (x.clone(), y.clone()),
        }
    }
}

impl FromStr for OverlayPosition {
    type Err = MediaError;

    /// Named corners, `center`, or `x=<n|n%>,y=<n|n%>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_left" => return Ok(OverlayPosition::TopLeft),
            "top_right" => return Ok(OverlayPosition::TopRight),
            "bottom_left" => return Ok(OverlayPosition::BottomLeft),
            "bottom_right" => return Ok(OverlayPosition::BottomRight),
            "center" => return Ok(OverlayPosition::Center),
            _ => {}
        }

        let invalid = || MediaError::invalid_argument(format!("unsupported overlay position: {s}"));
        let (x_part, y_part) = s.split_once(',').ok_or_else(invalid)?;
        let x = x_part.trim().strip_prefix("x=").ok_or_else(invalid)?;
        let y = y_part.trim().strip_prefix("y=").ok_or_else(invalid)?;

        Ok(OverlayPosition::Custom {
            x: coordinate(x, "W-w").ok_or_else(invalid)?,
            y: coordinate(y, "H-h").ok_or_else(invalid)?,
        })
    }
}

/// `50%` becomes a fraction of the free space, `100` stays a pixel offset.
fn coordinate(value: &str, free_space: &str) -> Option<String> {
    let value = value.trim();
    if let Some(percent) = value.strip_suffix('%') {
        let fraction = percent.trim().parse::<f64>().ok()? / 100.0;
        if !(0.0..=1.0).contains(&fraction) {
            return None;
        }
        return Some(format!("({free_space})*{fraction}"));
    }
    let pixels = value.parse::<u32>().ok()?;
    Some(pixels.to_string())
}

fn build_command(
    video: &Path,
    image: &Path,
    position: &OverlayPosition,
    scale: f64,
    opacity: f64,
    output: &Path,
) -> FfmpegCommand {
    let (x, y) = position.expressions();
    let filter = format!(
        "[1:v]scale=iw*{scale}:-1,format=rgba,colorchannelmixer=aa={opacity}[ovl];\
         [0:v][ovl]overlay={x}:{y}[out]"
    );
    FfmpegCommand::new(output)
        .input(video)
        .input(image)
        .filter_complex(filter)
        .map("[out]")
        .map("0:a?")
        .audio_codec("copy")
}

pub struct OverlayHandler {
    ctx: Arc<MediaContext>,
}

impl OverlayHandler {
    pub fn new(ctx: Arc<MediaContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskHandler for OverlayHandler {
    async fn run(&self, task: TaskContext, args: TaskArguments) -> anyhow::Result<Value> {
        let video_url = required_str(&args, "video_url")?;
        let image_url = required_str_any(&args, &["image_url", "meme_url"])?;
        let position: OverlayPosition = optional_str(&args, "position", "bottom_right")?.parse()?;
        let scale = optional_f64(&args, "scale", 0.3)?;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(MediaError::invalid_argument("scale must be in (0, 1]").into());
        }
        let opacity = optional_f64(&args, "opacity", 1.0)?;
        if !(0.0..=1.0).contains(&opacity) {
            return Err(MediaError::invalid_argument("opacity must be in [0, 1]").into());
        }

        let workspace = self.ctx.workspace(&task.job_id).await?;
        let dir = workspace.path();
        let video = self.ctx.downloader.download(video_url, dir, "video").await?;
        let image = self.ctx.downloader.download(image_url, dir, "overlay").await?;

        let info = probe_media(&video).await?;
        if !info.has_video() {
            return Err(MediaError::InvalidMedia("input has no video stream".into()).into());
        }
        info!(
            job_id = %task.job_id,
            width = info.width,
            height = info.height,
            "Inputs downloaded, applying overlay"
        );

        let output = dir.join("overlay.mp4");
        let cmd = build_command(&video, &image, &position, scale, opacity, &output);
        self.ctx.runner.run(&cmd).await?;

        Ok(self.ctx.publish(&task.job_id, &output).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_positions() {
        let pos = |s: &str| s.parse::<OverlayPosition>().unwrap().expressions();
        assert_eq!(pos("bottom_right"), ("W-w-10".into(), "H-h-10".into()));
        assert_eq!(pos("top_left"), ("10".into(), "10".into()));
        assert_eq!(pos("top_right"), ("W-w-10".into(), "10".into()));
        assert_eq!(pos("center"), ("(W-w)/2".into(), "(H-h)/2".into()));
    }

    #[test]
    fn test_custom_positions() {
        let pos = "x=50%,y=25%".parse::<OverlayPosition>().unwrap();
        assert_eq!(pos.expressions(), ("(W-w)*0.5".into(), "(H-h)*0.25".into()));

        let pos = "x=100, y=200".parse::<OverlayPosition>().unwrap();
        assert_eq!(pos.expressions(), ("100".into(), "200".into()));
    }

    #[test]
    fn test_invalid_positions() {
        for bad in ["middle", "x=1", "x=abc,y=1", "x=150%,y=0", "y=1,x=1"] {
            assert!(bad.parse::<OverlayPosition>().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_command_maps_overlay_and_audio() {
        let args = build_command(
            Path::new("v.mp4"),
            Path::new("i.png"),
            &OverlayPosition::BottomRight,
            0.3,
            1.0,
            Path::new("out.mp4"),
        )
        .build_args();

        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert_eq!(
            filter,
            "[1:v]scale=iw*0.3:-1,format=rgba,colorchannelmixer=aa=1[ovl];[0:v][ovl]overlay=W-w-10:H-h-10[out]"
        );
        assert!(args.windows(2).any(|w| w == ["-map", "[out]"]));
        assert!(args.windows(2).any(|w| w == ["-map", "0:a?"]));
    }
}
