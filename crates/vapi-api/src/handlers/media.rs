//! Synchronous media inspection.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;
use vapi_media::MediaInfo;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MediaInfoRequest {
    #[validate(url(message = "media_url must be a valid URL"))]
    pub media_url: String,
}

#[derive(Serialize)]
pub struct MediaInfoResponse {
    pub status: &'static str,
    pub result: MediaInfo,
}

/// `POST /api/v1/ffmpeg/media-info`
///
/// Downloads the file and probes it within the request.
pub async fn media_info(
    State(state): State<AppState>,
    body: Result<Json<MediaInfoRequest>, JsonRejection>,
) -> ApiResult<Json<MediaInfoResponse>> {
    let Json(request) = body?;
    request.validate()?;

    let result = state.media.inspect(&request.media_url).await?;
    Ok(Json(MediaInfoResponse {
        status: "success",
        result,
    }))
}
