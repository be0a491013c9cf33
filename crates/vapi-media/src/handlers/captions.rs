//! Burn subtitles into a video.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use vapi_models::TaskArguments;
use vapi_queue::{TaskContext, TaskHandler};

use super::args::{optional_bool, optional_str, optional_u32, required_str};
use super::MediaContext;
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

#[derive(Debug, Clone, PartialEq)]
struct CaptionStyle {
    font: String,
    font_size: u32,
    /// ASS colour, `&HAABBGGRR`
    colour: String,
    background: bool,
    /// ASS numpad alignment
    alignment: u8,
}

impl CaptionStyle {
    fn from_args(args: &TaskArguments) -> MediaResult<Self> {
        let font = optional_str(args, "font", "Arial")?;
        if font.is_empty() || font.contains([',', '\'', ':', '\\', '=']) {
            return Err(MediaError::invalid_argument(format!("unsupported font name: {font}")));
        }
        let font_size = optional_u32(args, "font_size", 24)?;
        if !(1..=200).contains(&font_size) {
            return Err(MediaError::invalid_argument("font_size must be between 1 and 200"));
        }
        let alignment = match optional_str(args, "position", "bottom")? {
            "bottom" => 2,
            "center" | "middle" => 5,
            "top" => 8,
            other => {
                return Err(MediaError::invalid_argument(format!(
                    "position must be top, center or bottom, got {other}"
                )))
            }
        };

        Ok(Self {
            font: font.to_string(),
            font_size,
            colour: ass_colour(optional_str(args, "font_color", "white")?)?,
            background: optional_bool(args, "background", true)?,
            alignment,
        })
    }

    fn force_style(&self) -> String {
        let mut style = format!(
            "FontName={},FontSize={},PrimaryColour={},Alignment={}",
            self.font, self.font_size, self.colour, self.alignment
        );
        if self.background {
            style.push_str(",BorderStyle=4,BackColour=&H80000000");
        }
        style
    }
}

/// Convert a colour name or `#RRGGBB` to ASS `&HAABBGGRR`.
fn ass_colour(colour: &str) -> MediaResult<String> {
    let rgb = match colour.to_ascii_lowercase().as_str() {
        "white" => "FFFFFF".to_string(),
        "black" => "000000".to_string(),
        "red" => "FF0000".to_string(),
        "green" => "00FF00".to_string(),
        "blue" => "0000FF".to_string(),
        "yellow" => "FFFF00".to_string(),
        hex => {
            let hex = hex.trim_start_matches('#');
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(MediaError::invalid_argument(format!("unsupported font_color: {colour}")));
            }
            hex.to_ascii_uppercase()
        }
    };
    Ok(format!("&H00{}{}{}", &rgb[4..6], &rgb[2..4], &rgb[0..2]))
}

/// Escape a path for use as a filter option value.
fn escape_filter_value(path: &Path) -> String {
    let mut out = String::new();
    for c in path.to_string_lossy().chars() {
        if matches!(c, '\\' | '\'' | ':' | ',' | ';' | '[' | ']' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn build_command(video: &Path, subtitles: &Path, style: &CaptionStyle, output: &Path) -> FfmpegCommand {
    let filter = format!(
        "subtitles={}:force_style='{}'",
        escape_filter_value(subtitles),
        style.force_style()
    );
    FfmpegCommand::new(output)
        .input(video)
        .video_filter(filter)
        .audio_codec("copy")
}

pub struct CaptionsHandler {
    ctx: Arc<MediaContext>,
}

impl CaptionsHandler {
    pub fn new(ctx: Arc<MediaContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskHandler for CaptionsHandler {
    async fn run(&self, task: TaskContext, args: TaskArguments) -> anyhow::Result<Value> {
        let video_url = required_str(&args, "video_url")?;
        let subtitles_url = required_str(&args, "subtitles_url")?;
        let style = CaptionStyle::from_args(&args)?;

        let workspace = self.ctx.workspace(&task.job_id).await?;
        let dir = workspace.path();
        let video = self.ctx.downloader.download(video_url, dir, "video").await?;
        let subtitles = self.ctx.downloader.download(subtitles_url, dir, "subtitles").await?;
        info!(job_id = %task.job_id, "Inputs downloaded, burning captions");

        let output = dir.join("captioned.mp4");
        self.ctx
            .runner
            .run(&build_command(&video, &subtitles, &style, &output))
            .await?;

        Ok(self.ctx.publish(&task.job_id, &output).await?)
    }
}
