//! Broker configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::memory::MemoryBroker;
use crate::redis_broker::RedisConnector;
use crate::store::{BrokerConnector, StoreResult};

/// URL scheme selecting the in-process broker.
pub const MEMORY_URL_SCHEME: &str = "memory://";

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker URL (`redis://...` or `memory://`)
    pub url: String,
    /// Connection attempts before giving up
    pub retry_attempts: u32,
    /// Base reconnect delay, doubled per attempt
    pub retry_backoff: Duration,
    /// Upper bound for a single reconnect delay
    pub retry_max_delay: Duration,
    /// List holding pending task references
    pub queue_name: String,
    /// Key prefix for task records
    pub task_key_prefix: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            retry_attempts: 5,
            retry_backoff: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(60),
            queue_name: "video_api:queue".to_string(),
            task_key_prefix: "video_api:task:".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("REDIS_URL").unwrap_or(defaults.url),
            retry_attempts: std::env::var("REDIS_RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_attempts),
            retry_backoff: std::env::var("REDIS_RETRY_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.retry_backoff),
            retry_max_delay: std::env::var("REDIS_RETRY_MAX_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_max_delay),
            queue_name: std::env::var("QUEUE_NAME").unwrap_or(defaults.queue_name),
            task_key_prefix: std::env::var("TASK_KEY_PREFIX").unwrap_or(defaults.task_key_prefix),
        }
    }

    /// Delay before the reconnect attempt following `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_backoff
            .saturating_mul(factor)
            .min(self.retry_max_delay)
    }

    /// Build the connector named by `url`.
    ///
    /// A `memory://` broker lives inside this process only, so it is useful for
    /// tests and single-binary development setups.
    pub fn connector(&self) -> StoreResult<Arc<dyn BrokerConnector>> {
        if self.url.starts_with(MEMORY_URL_SCHEME) {
            Ok(Arc::new(MemoryBroker::new()))
        } else {
            Ok(Arc::new(RedisConnector::new(&self.url)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_secs(2));
        assert_eq!(config.queue_name, "video_api:queue");
        assert_eq!(config.task_key_prefix, "video_api:task:");
    }

    #[test]
    fn test_exponential_backoff() {
        let config = BrokerConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(16));
    }

    #[test]
    fn test_backoff_capped() {
        let config = BrokerConfig {
            retry_max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(10));
    }

    #[test]
    fn test_memory_url_selects_memory_broker() {
        let config = BrokerConfig {
            url: "memory://".to_string(),
            ..Default::default()
        };
        assert_eq!(config.connector().unwrap().describe(), "memory://");
    }
}
