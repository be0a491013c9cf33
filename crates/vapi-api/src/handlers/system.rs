//! System routes: queue statistics, host status and service health.

use std::path::Path;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sysinfo::{Disks, System};
use vapi_models::QueueStats;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SystemHealthResponse {
    pub status: String,
    pub environment: String,
    pub version: String,
}

pub async fn system_health(State(state): State<AppState>) -> Json<SystemHealthResponse> {
    Json(SystemHealthResponse {
        status: "healthy".to_string(),
        environment: state.config.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub api_version: &'static str,
    pub platform: String,
}

pub async fn system_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        api_version: "v1",
        platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
    })
}

/// Queue length and task counts by status.
pub async fn queue_stats(State(state): State<AppState>) -> ApiResult<Json<QueueStats>> {
    let stats = state.tasks.get_queue_stats().await?;
    metrics::set_queue_length(stats.queue_length);
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct MemoryUsage {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
}

#[derive(Debug, Serialize)]
pub struct DiskUsage {
    pub total: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Serialize)]
pub struct HostUsage {
    pub cpu_percent: f32,
    pub memory: MemoryUsage,
    /// Root filesystem, or the first mounted disk when `/` is not listed
    pub disk: Option<DiskUsage>,
}

#[derive(Serialize)]
pub struct SystemStatusResponse {
    pub status: &'static str,
    pub system: HostUsage,
    pub queue: QueueStats,
}

/// Host resource usage plus queue statistics.
pub async fn system_status(
    State(state): State<AppState>,
) -> ApiResult<Json<SystemStatusResponse>> {
    let queue = state.tasks.get_queue_stats().await?;
    metrics::set_queue_length(queue.queue_length);

    let system = tokio::task::spawn_blocking(host_usage)
        .await
        .map_err(|e| ApiError::internal(format!("host usage: {e}")))?;

    Ok(Json(SystemStatusResponse {
        status: "operational",
        system,
        queue,
    }))
}

fn host_usage() -> HostUsage {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_cpu();

    let cpus = system.cpus();
    let cpu_percent = if cpus.is_empty() {
        0.0
    } else {
        cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
    };

    let total_memory = system.total_memory();
    let available_memory = system.available_memory();

    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first())
        .map(|d| DiskUsage {
            total: d.total_space(),
            free: d.available_space(),
            percent: percent(
                d.total_space().saturating_sub(d.available_space()),
                d.total_space(),
            ),
        });

    HostUsage {
        cpu_percent,
        memory: MemoryUsage {
            total: total_memory,
            available: available_memory,
            percent: percent(total_memory.saturating_sub(available_memory), total_memory),
        },
        disk,
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}
