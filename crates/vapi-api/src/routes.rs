//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::handlers::jobs::get_job;
use crate::handlers::media::media_info;
use crate::handlers::system::{queue_stats, system_health, system_status, system_version};
use crate::handlers::tasks::{
    caption_video, concatenate_videos, image_overlay, media_to_mp3, meme_overlay,
    submit_generic, thumbnail,
};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, require_api_key, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let task_routes = Router::new()
        .route("/video/caption", post(caption_video))
        .route("/video/meme-overlay", post(meme_overlay))
        .route("/video/concatenate", post(concatenate_videos))
        .route("/image/overlay", post(image_overlay))
        .route("/image/thumbnail", post(thumbnail))
        .route("/media/media-to-mp3", post(media_to_mp3))
        .route("/tasks/:task_type", post(submit_generic))
        .route("/ffmpeg/media-info", post(media_info));

    let status_routes = Router::new()
        .route("/jobs/:job_id", get(get_job))
        .route("/system/queue", get(queue_stats))
        .route("/system/status", get(system_status));

    // Everything under /api/v1 except health and version needs the API key
    let protected = Router::new()
        .merge(task_routes)
        .merge(status_routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let api_v1 = Router::new()
        .merge(protected)
        .route("/system/health", get(system_health))
        .route("/system/version", get(system_version));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api/v1", api_v1)
        .nest_service("/storage", ServeDir::new(&state.storage_root))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
