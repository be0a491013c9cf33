//! Task submission handlers.
//!
//! Each route deserializes and validates a typed body, strips the `id` and
//! `webhook_url` envelope fields, and submits the rest as the task's
//! arguments. Every route answers `202 Accepted` with the submission receipt.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};
use vapi_models::{TaskArguments, TaskType};
use vapi_queue::{SubmitReceipt, SubmitRequest};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

type Accepted = (StatusCode, Json<SubmitReceipt>);

/// A typed submission body for one task type.
trait TaskRequest: Serialize + Validate {
    const TASK_TYPE: TaskType;

    /// Take the `id` and `webhook_url` envelope fields out of the body.
    fn envelope(&mut self) -> (Option<String>, Option<String>);
}

macro_rules! task_request {
    ($request:ty, $task_type:expr) => {
        impl TaskRequest for $request {
            const TASK_TYPE: TaskType = $task_type;

            fn envelope(&mut self) -> (Option<String>, Option<String>) {
                (self.id.take(), self.webhook_url.take())
            }
        }
    };
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CaptionRequest {
    #[validate(url(message = "video_url must be a valid URL"))]
    pub video_url: String,
    #[validate(url(message = "subtitles_url must be a valid URL"))]
    pub subtitles_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[validate(range(min = 12, max = 72))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
    #[validate(custom(function = "validate_caption_position"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[validate(url(message = "webhook_url must be a valid URL"))]
    #[serde(default, skip_serializing)]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}
task_request!(CaptionRequest, TaskType::AddCaptionsToVideo);

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MemeOverlayRequest {
    #[validate(url(message = "video_url must be a valid URL"))]
    pub video_url: String,
    #[validate(url(message = "meme_url must be a valid URL"))]
    pub meme_url: String,
    /// Named corner/center or `x=..,y=..`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[validate(range(min = 0.1, max = 1.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[validate(url(message = "webhook_url must be a valid URL"))]
    #[serde(default, skip_serializing)]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}
task_request!(MemeOverlayRequest, TaskType::OverlayImageOnVideo);

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ImageOverlayRequest {
    #[validate(url(message = "video_url must be a valid URL"))]
    pub video_url: String,
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: String,
    #[validate(custom(function = "validate_overlay_position"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[validate(range(min = 0.1, max = 1.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[validate(url(message = "webhook_url must be a valid URL"))]
    #[serde(default, skip_serializing)]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}
task_request!(ImageOverlayRequest, TaskType::OverlayImageOnVideo);

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ConcatenateRequest {
    #[validate(length(min = 2, message = "at least two videos are required"))]
    #[validate(custom(function = "validate_url_list"))]
    pub video_urls: Vec<String>,
    #[validate(url(message = "webhook_url must be a valid URL"))]
    #[serde(default, skip_serializing)]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}
task_request!(ConcatenateRequest, TaskType::ConcatenateVideos);

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MediaToMp3Request {
    #[validate(url(message = "media_url must be a valid URL"))]
    pub media_url: String,
    #[validate(custom(function = "validate_bitrate"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    #[validate(custom(function = "validate_audio_format"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[validate(url(message = "webhook_url must be a valid URL"))]
    #[serde(default, skip_serializing)]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}
task_request!(MediaToMp3Request, TaskType::ExtractAudio);

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ThumbnailRequest {
    #[validate(url(message = "video_url must be a valid URL"))]
    pub video_url: String,
    #[validate(range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[validate(range(min = 32, max = 3840))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[validate(range(min = 32, max = 2160))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[validate(url(message = "webhook_url must be a valid URL"))]
    #[serde(default, skip_serializing)]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
}
task_request!(ThumbnailRequest, TaskType::GenerateThumbnail);

fn validate_caption_position(position: &str) -> Result<(), ValidationError> {
    match position {
        "bottom" | "top" | "center" => Ok(()),
        _ => Err(ValidationError::new("position")
            .with_message("position must be one of bottom, top, center".into())),
    }
}

fn validate_overlay_position(position: &str) -> Result<(), ValidationError> {
    match position {
        "top_left" | "top_right" | "bottom_left" | "bottom_right" | "center" => Ok(()),
        _ => Err(ValidationError::new("position").with_message(
            "position must be one of top_left, top_right, bottom_left, bottom_right, center".into(),
        )),
    }
}

fn validate_bitrate(bitrate: &str) -> Result<(), ValidationError> {
    let digits = bitrate.strip_suffix('k').unwrap_or_default();
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("bitrate").with_message("bitrate must look like 192k".into()))
    }
}

fn validate_audio_format(format: &str) -> Result<(), ValidationError> {
    match format {
        "mp3" | "wav" | "aac" | "flac" => Ok(()),
        _ => Err(ValidationError::new("format")
            .with_message("format must be one of mp3, wav, aac, flac".into())),
    }
}

fn validate_url_list(urls: &[String]) -> Result<(), ValidationError> {
    let all_http = urls.iter().all(|u| {
        let u = u.trim_start();
        u.starts_with("http://") || u.starts_with("https://")
    });
    if all_http {
        Ok(())
    } else {
        Err(ValidationError::new("video_urls")
            .with_message("every video URL must be http or https".into()))
    }
}

async fn submit_task(
    state: &AppState,
    task_type: TaskType,
    job_id: Option<String>,
    webhook_url: Option<String>,
    arguments: TaskArguments,
) -> ApiResult<Accepted> {
    let mut request = SubmitRequest::new(task_type.as_str(), arguments);
    if let Some(id) = job_id {
        request = request.with_job_id(id);
    }
    if let Some(url) = webhook_url {
        request = request.with_callback(url);
    }

    let receipt = state.tasks.submit(request).await?;
    metrics::record_task_submitted(task_type.as_str());
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

async fn submit_typed<R: TaskRequest>(
    state: &AppState,
    body: Result<Json<R>, JsonRejection>,
) -> ApiResult<Accepted> {
    let Json(mut request) = body?;
    request.validate()?;

    let (job_id, webhook_url) = request.envelope();
    let arguments = match serde_json::to_value(&request) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(ApiError::internal("task arguments must be an object")),
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };

    submit_task(state, R::TASK_TYPE, job_id, webhook_url, arguments).await
}

/// `POST /api/v1/video/caption`
pub async fn caption_video(
    State(state): State<AppState>,
    body: Result<Json<CaptionRequest>, JsonRejection>,
) -> ApiResult<Accepted> {
    submit_typed(&state, body).await
}

/// `POST /api/v1/video/meme-overlay`
pub async fn meme_overlay(
    State(state): State<AppState>,
    body: Result<Json<MemeOverlayRequest>, JsonRejection>,
) -> ApiResult<Accepted> {
    submit_typed(&state, body).await
}

/// `POST /api/v1/video/concatenate`
pub async fn concatenate_videos(
    State(state): State<AppState>,
    body: Result<Json<ConcatenateRequest>, JsonRejection>,
) -> ApiResult<Accepted> {
    submit_typed(&state, body).await
}

/// `POST /api/v1/image/overlay`
pub async fn image_overlay(
    State(state): State<AppState>,
    body: Result<Json<ImageOverlayRequest>, JsonRejection>,
) -> ApiResult<Accepted> {
    submit_typed(&state, body).await
}

/// `POST /api/v1/image/thumbnail`
pub async fn thumbnail(
    State(state): State<AppState>,
    body: Result<Json<ThumbnailRequest>, JsonRejection>,
) -> ApiResult<Accepted> {
    submit_typed(&state, body).await
}

/// `POST /api/v1/media/media-to-mp3`
pub async fn media_to_mp3(
    State(state): State<AppState>,
    body: Result<Json<MediaToMp3Request>, JsonRejection>,
) -> ApiResult<Accepted> {
    submit_typed(&state, body).await
}

/// `POST /api/v1/tasks/:task_type`
///
/// Accepts any catalogued task type with a free-form argument object.
pub async fn submit_generic(
    State(state): State<AppState>,
    Path(task_type): Path<String>,
    body: Result<Json<TaskArguments>, JsonRejection>,
) -> ApiResult<Accepted> {
    let task_type: TaskType = task_type
        .parse()
        .map_err(|e: vapi_models::UnknownTaskType| ApiError::bad_request(e.to_string()))?;
    let Json(mut arguments) = body?;

    let job_id = take_string(&mut arguments, "id")?;
    let webhook_url = take_string(&mut arguments, "webhook_url")?;

    submit_task(&state, task_type, job_id, webhook_url, arguments).await
}

/// Remove an optional string envelope field from a free-form body.
fn take_string(arguments: &mut TaskArguments, field: &str) -> ApiResult<Option<String>> {
    match arguments.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ApiError::bad_request(format!("{field} must be a string"))),
    }
}
