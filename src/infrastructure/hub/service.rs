//! Notification hub trait and error types.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to a hub.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Hub connection error: {0}")]
    ConnectionError(String),
    #[error("Hub publish error: {0}")]
    PublishError(String),
}

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// A message for the real-time subscribers of one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub topic: String,
    pub payload: Value,
}

impl Update {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Pub/sub hub the notification stage publishes to.
///
/// Implementations are shared between concurrently running handlers and must
/// accept concurrent `publish` calls.
///
/// # Implementations
///
/// - [`crate::infrastructure::hub::RedisHub`] - Redis `PUBLISH`
/// - [`crate::infrastructure::hub::NullHub`] - No-op implementation for disabled notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationHub: Send + Sync {
    /// Publishes one update.
    ///
    /// # Errors
    ///
    /// Returns [`HubError`] on any transport failure. Callers treat it as
    /// non-fatal.
    async fn publish(&self, update: &Update) -> HubResult<()>;

    /// Checks if the hub backend is reachable.
    async fn health_check(&self) -> bool;
}
