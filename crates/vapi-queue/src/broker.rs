//! Broker connection manager.
//!
//! Owns the current broker handle and heals it. Connecting retries with
//! exponential backoff (`base × 2^attempt`, capped) up to the configured
//! attempt budget and then reports the broker as unavailable. Every operation
//! routed through [`BrokerManager::execute`] that hits a connectivity error
//! reconnects once and retries once before propagating the failure.
//!
//! The handle is swapped behind the manager on reconnect, so the task store and
//! work queue never hold a connection of their own.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::{QueueError, QueueResult};
use crate::store::{BrokerConnection, BrokerConnector, StoreResult};

pub struct BrokerManager {
    connector: Arc<dyn BrokerConnector>,
    config: BrokerConfig,
    current: RwLock<Option<Arc<dyn BrokerConnection>>>,
    /// Serializes connection attempts so concurrent failures reconnect once.
    connecting: Mutex<()>,
}

impl BrokerManager {
    pub fn new(connector: Arc<dyn BrokerConnector>, config: BrokerConfig) -> Self {
        Self {
            connector,
            config,
            current: RwLock::new(None),
            connecting: Mutex::new(()),
        }
    }

    /// Build a manager for the broker named in `config`.
    pub fn from_config(config: BrokerConfig) -> QueueResult<Self> {
        let connector = config.connector()?;
        Ok(Self::new(connector, config))
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn connector(&self) -> Arc<dyn BrokerConnector> {
        Arc::clone(&self.connector)
    }

    /// Whether a handle is currently held. Says nothing about its health.
    pub async fn is_connected(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Current handle, connecting first if none is held.
    pub async fn connection(&self) -> QueueResult<Arc<dyn BrokerConnection>> {
        if let Some(conn) = self.current.read().await.as_ref() {
            return Ok(Arc::clone(conn));
        }
        self.replace(None).await
    }

    /// Drop `stale` and connect again.
    ///
    /// If another caller already replaced `stale`, its fresh handle is returned
    /// without opening a new connection.
    pub async fn reconnect(
        &self,
        stale: &Arc<dyn BrokerConnection>,
    ) -> QueueResult<Arc<dyn BrokerConnection>> {
        self.replace(Some(stale)).await
    }

    async fn replace(
        &self,
        stale: Option<&Arc<dyn BrokerConnection>>,
    ) -> QueueResult<Arc<dyn BrokerConnection>> {
        let _guard = self.connecting.lock().await;

        if let Some(conn) = self.current.read().await.as_ref() {
            let is_stale = stale.is_some_and(|s| Arc::ptr_eq(s, conn));
            if !is_stale {
                return Ok(Arc::clone(conn));
            }
        }
        self.current.write().await.take();

        let conn = self.connect_with_backoff().await?;
        *self.current.write().await = Some(Arc::clone(&conn));
        Ok(conn)
    }

    async fn connect_with_backoff(&self) -> QueueResult<Arc<dyn BrokerConnection>> {
        let target = self.connector.describe();
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.connector.connect().await {
                Ok(conn) => {
                    if attempt > 0 {
                        info!(target = %target, attempt = attempt + 1, "Reconnected to broker");
                    } else {
                        debug!(target = %target, "Connected to broker");
                    }
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(
                        target = %target,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "Broker connection attempt failed"
                    );
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.config.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(QueueError::unavailable(format!(
            "{target} unreachable after {attempts} attempts: {reason}"
        )))
    }

    /// Run a broker operation, reconnecting and retrying once on connectivity loss.
    ///
    /// Command errors are never retried.
    pub async fn execute<T, F, Fut>(&self, operation: &str, op: F) -> QueueResult<T>
    where
        F: Fn(Arc<dyn BrokerConnection>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let conn = self.connection().await?;
        match op(Arc::clone(&conn)).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_connectivity() => {
                warn!(operation, error = %e, "Broker connection lost, reconnecting");
                let conn = self.reconnect(&conn).await?;
                op(conn).await.map_err(|e| QueueError::store(operation, e))
            }
            Err(e) => Err(QueueError::store(operation, e)),
        }
    }

    /// Health check through the managed connection.
    pub async fn ping(&self) -> QueueResult<()> {
        self.execute("ping", |conn| async move { conn.ping().await })
            .await
    }
}
