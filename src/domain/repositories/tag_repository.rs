//! Repository trait for tags.

use crate::domain::entities::AuthorizationScope;
use crate::error::AppError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Whether the tag exists and, for a restricted scope, is attached to at
    /// least one short URL visible in it.
    async fn tag_exists(
        &self,
        tag: &str,
        scope: Option<AuthorizationScope>,
    ) -> Result<bool, AppError>;
}
