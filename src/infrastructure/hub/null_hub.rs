//! No-op hub for disabled notifications.

use super::service::{HubResult, NotificationHub, Update};
use async_trait::async_trait;
use tracing::debug;

/// A hub that drops every update.
///
/// Used when Redis is not configured or cannot be reached at startup.
pub struct NullHub;

impl NullHub {
    pub fn new() -> Self {
        debug!("Using NullHub (notifications disabled)");
        Self
    }
}

impl Default for NullHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationHub for NullHub {
    async fn publish(&self, _update: &Update) -> HubResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
