//! Extract or transcode the audio track of a media file.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use vapi_models::TaskArguments;
use vapi_queue::{TaskContext, TaskHandler};

use super::args::{optional_str, required_str};
use super::MediaContext;
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioFormat {
    Mp3,
    Wav,
    Aac,
    Flac,
}

impl AudioFormat {
    fn codec(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Wav => "pcm_s16le",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
        }
    }

    /// Lossless formats ignore the bitrate.
    fn uses_bitrate(self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::Aac)
    }
}

impl FromStr for AudioFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "aac" => Ok(AudioFormat::Aac),
            "flac" => Ok(AudioFormat::Flac),
            other => Err(MediaError::invalid_argument(format!(
                "format must be one of mp3, wav, aac, flac, got {other}"
            ))),
        }
    }
}

/// Bitrates look like `192k`.
fn validate_bitrate(bitrate: &str) -> MediaResult<&str> {
    let valid = bitrate
        .strip_suffix('k')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    if valid {
        Ok(bitrate)
    } else {
        Err(MediaError::invalid_argument(format!("bitrate must look like 192k, got {bitrate}")))
    }
}

fn build_command(input: &Path, format: AudioFormat, bitrate: &str, output: &Path) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(output)
        .input(input)
        .no_video()
        .audio_codec(format.codec());
    if format.uses_bitrate() {
        cmd.audio_bitrate(bitrate)
    } else {
        cmd
    }
}

pub struct ExtractAudioHandler {
    ctx: Arc<MediaContext>,
}

impl ExtractAudioHandler {
    pub fn new(ctx: Arc<MediaContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskHandler for ExtractAudioHandler {
    async fn run(&self, task: TaskContext, args: TaskArguments) -> anyhow::Result<Value> {
        let media_url = required_str(&args, "media_url")?;
        let bitrate = validate_bitrate(optional_str(&args, "bitrate", "192k")?)?;
        let format: AudioFormat = optional_str(&args, "format", "mp3")?.parse()?;

        let workspace = self.ctx.workspace(&task.job_id).await?;
        let dir = workspace.path();
        let input = self.ctx.downloader.download(media_url, dir, "media").await?;
        info!(job_id = %task.job_id, format = format.extension(), bitrate, "Input downloaded, extracting audio");

        let output = dir.join(format!("audio.{}", format.extension()));
        self.ctx
            .runner
            .run(&build_command(&input, format, bitrate, &output))
            .await?;

        Ok(self.ctx.publish(&task.job_id, &output).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!("flac".parse::<AudioFormat>().unwrap(), AudioFormat::Flac);
        assert!("ogg".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_bitrate_validation() {
        assert!(validate_bitrate("192k").is_ok());
        assert!(validate_bitrate("64k").is_ok());
        assert!(validate_bitrate("k").is_err());
        assert!(validate_bitrate("192").is_err());
        assert!(validate_bitrate("1.5k").is_err());
    }

    #[test]
    fn test_mp3_command() {
        let args = build_command(Path::new("in.mp4"), AudioFormat::Mp3, "128k", Path::new("a.mp3"))
            .build_args();
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libmp3lame"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "128k"]));
    }

    #[test]
    fn test_wav_command_has_no_bitrate() {
        let args = build_command(Path::new("in.mp4"), AudioFormat::Wav, "128k", Path::new("a.wav"))
            .build_args();
        assert!(args.windows(2).any(|w| w == ["-c:a", "pcm_s16le"]));
        assert!(!args.contains(&"-b:a".to_string()));
    }
}
