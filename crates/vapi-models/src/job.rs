//! Job identifiers and the task type catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a task.
///
/// Either supplied by the caller at submission time or generated as a UUIDv4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Media task types a deployment registers handlers for.
///
/// The queue itself treats task types as opaque strings; this catalog is what
/// the HTTP layer and the worker's handler table agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Burn subtitles into a video
    AddCaptionsToVideo,
    /// Overlay an image (meme, watermark) on a video
    OverlayImageOnVideo,
    /// Join several videos end to end
    ConcatenateVideos,
    /// Extract/transcode the audio track
    ExtractAudio,
    /// Grab a single frame as an image
    GenerateThumbnail,
}

impl TaskType {
    /// Every catalogued task type.
    pub const ALL: [TaskType; 5] = [
        TaskType::AddCaptionsToVideo,
        TaskType::OverlayImageOnVideo,
        TaskType::ConcatenateVideos,
        TaskType::ExtractAudio,
        TaskType::GenerateThumbnail,
    ];

    /// Registry name for this task type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::AddCaptionsToVideo => "add_captions_to_video",
            TaskType::OverlayImageOnVideo => "overlay_image_on_video",
            TaskType::ConcatenateVideos => "concatenate_videos",
            TaskType::ExtractAudio => "extract_audio",
            TaskType::GenerateThumbnail => "generate_thumbnail",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name is not in the task type catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown task type: {0}")]
pub struct UnknownTaskType(pub String);

impl FromStr for TaskType {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_captions_to_video" => Ok(TaskType::AddCaptionsToVideo),
            // The meme overlay route shares the image overlay handler.
            "overlay_image_on_video" | "process_meme_overlay" => {
                Ok(TaskType::OverlayImageOnVideo)
            }
            "concatenate_videos" => Ok(TaskType::ConcatenateVideos),
            "extract_audio" => Ok(TaskType::ExtractAudio),
            "generate_thumbnail" => Ok(TaskType::GenerateThumbnail),
            other => Err(UnknownTaskType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generation_is_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_job_id_serializes_transparently() {
        let id = JobId::from("job-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job-123\"");
    }

    #[test]
    fn test_task_type_names_parse_back() {
        for task_type in TaskType::ALL {
            assert_eq!(task_type.as_str().parse::<TaskType>(), Ok(task_type));
        }
    }

    #[test]
    fn test_meme_overlay_alias() {
        assert_eq!(
            "process_meme_overlay".parse::<TaskType>(),
            Ok(TaskType::OverlayImageOnVideo)
        );
    }

    #[test]
    fn test_unknown_task_type() {
        let err = "does_not_exist".parse::<TaskType>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown task type: does_not_exist");
    }
}
