//! Task worker binary.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vapi_media::{check_ffmpeg, check_ffprobe, register_media_handlers, MediaConfig, MediaContext};
use vapi_queue::{BrokerConfig, TaskRegistry};
use vapi_storage::{LocalStorage, StorageConfig};
use vapi_worker::{metrics, WebhookConfig, WebhookNotifier, WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vapi-worker");

    let config = WorkerConfig::from_env();
    let broker_config = BrokerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match metrics::init_metrics(port) {
            Ok(()) => info!(port, "Metrics endpoint listening"),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    if let Err(e) = check_ffmpeg().and_then(|_| check_ffprobe()) {
        warn!("Media tasks will fail until this is fixed: {}", e);
    }

    let connector = match broker_config.connector() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid broker configuration: {}", e);
            std::process::exit(1);
        }
    };

    let storage = LocalStorage::new(StorageConfig::from_env());
    let media = match MediaContext::new(MediaConfig::from_env(), storage) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to create media context: {}", e);
            std::process::exit(1);
        }
    };

    let mut registry = TaskRegistry::new();
    register_media_handlers(&mut registry, media);

    let notifier = match WebhookNotifier::new(WebhookConfig::from_env()) {
        Ok(n) => n,
        Err(e) => {
            error!("Failed to create webhook client: {}", e);
            std::process::exit(1);
        }
    };

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    WorkerPool::new(
        config,
        broker_config,
        connector,
        Arc::new(registry),
        notifier,
    )
    .run(token)
    .await;

    info!("Worker shutdown complete");
}

/// JSON logs when `LOG_FORMAT=json`, coloured text otherwise.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vapi=info,vapi_worker=info,vapi_queue=info,vapi_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, finishing in-flight tasks");
    token.cancel();
}
