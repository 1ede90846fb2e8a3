//! Real-time notification hubs.
//!
//! Provides a [`NotificationHub`] trait with two implementations:
//! - [`RedisHub`] - Redis pub/sub
//! - [`NullHub`] - No-op implementation for disabled notifications

mod null_hub;
mod redis_hub;
mod service;

pub use null_hub::NullHub;
pub use redis_hub::RedisHub;
pub use service::{HubError, HubResult, NotificationHub, Update};

#[cfg(test)]
pub use service::MockNotificationHub;
