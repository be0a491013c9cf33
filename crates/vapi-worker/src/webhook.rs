//! Webhook notification of terminal task status.
//!
//! Delivery is best effort: a bounded number of POST attempts with a fixed
//! delay between them. The outcome never changes the task's recorded status.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Url};
use tracing::{debug, error, info, warn};
use vapi_models::WebhookEvent;

use crate::error::WorkerResult;
use crate::metrics;

/// Webhook delivery configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
        }
    }
}

impl WebhookConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: std::env::var("WEBHOOK_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            retry_delay: std::env::var("WEBHOOK_RETRY_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            timeout: std::env::var("WEBHOOK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Outcome of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: bool,
    pub attempts: u32,
    /// HTTP status of the last response, if any arrived
    pub last_status: Option<u16>,
}

/// Sends [`WebhookEvent`]s to callback addresses.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> WorkerResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("vapi-worker/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// POST `event` to `address`, retrying until a 2xx response or the attempt
    /// budget is spent.
    pub async fn notify(&self, address: &str, event: &WebhookEvent) -> DeliveryReport {
        let mut report = DeliveryReport {
            delivered: false,
            attempts: 0,
            last_status: None,
        };

        let url = match Url::parse(address) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => {
                warn!(job_id = %event.job_id, address, "Invalid callback address, skipping webhook");
                metrics::record_webhook(false);
                return report;
            }
        };

        while report.attempts < self.config.max_attempts {
            report.attempts += 1;

            let response = self
                .client
                .post(url.clone())
                .header("X-Job-Id", event.job_id.as_str())
                .json(event)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    report.last_status = Some(status.as_u16());
                    if status.is_success() {
                        report.delivered = true;
                        info!(
                            job_id = %event.job_id,
                            status = %event.status,
                            attempts = report.attempts,
                            "Webhook delivered"
                        );
                        break;
                    }
                    warn!(
                        job_id = %event.job_id,
                        attempt = report.attempts,
                        http_status = status.as_u16(),
                        "Webhook rejected"
                    );
                }
                Err(e) => {
                    warn!(
                        job_id = %event.job_id,
                        attempt = report.attempts,
                        error = %e,
                        "Webhook request failed"
                    );
                }
            }

            if report.attempts < self.config.max_attempts {
                debug!(delay_ms = self.config.retry_delay.as_millis() as u64, "Retrying webhook");
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        if !report.delivered {
            error!(
                job_id = %event.job_id,
                attempts = report.attempts,
                "Webhook delivery failed, giving up"
            );
        }
        metrics::record_webhook(report.delivered);
        report
    }
}
