//! Redis-backed notification hub.

use super::service::{HubError, HubResult, NotificationHub, Update};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, info};

/// Hub publishing every update with Redis `PUBLISH topic payload`.
///
/// The `ConnectionManager` is cloned per call; clones share one multiplexed
/// connection and reconnect on their own.
pub struct RedisHub {
    client: ConnectionManager,
}

impl RedisHub {
    /// Connects to Redis. Reachability is checked separately with
    /// [`NotificationHub::health_check`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ConnectionError`] if the URL is invalid or the
    /// connection cannot be established.
    pub async fn connect(redis_url: &str) -> HubResult<Self> {
        info!("Connecting to Redis notification hub");

        let client = Client::open(redis_url).map_err(|e| {
            HubError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            HubError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        info!("Connected to Redis notification hub");

        Ok(Self { client: manager })
    }
}

#[async_trait]
impl NotificationHub for RedisHub {
    async fn publish(&self, update: &Update) -> HubResult<()> {
        let mut conn = self.client.clone();
        let payload = update.payload.to_string();

        let receivers = conn
            .publish::<_, _, i64>(&update.topic, payload)
            .await
            .map_err(|e| HubError::PublishError(e.to_string()))?;

        debug!(topic = %update.topic, receivers, "Update published");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
