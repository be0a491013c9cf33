//! Job status polling.

use axum::extract::{Path, State};
use axum::Json;
use vapi_models::{JobId, TaskRecord};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Latest snapshot of a task.
///
/// Returns:
/// - 200: the task record
/// - 404: no record for this job id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<TaskRecord>> {
    let job_id = JobId::from(job_id);
    state
        .tasks
        .get_status(&job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job not found: {job_id}")))
}
