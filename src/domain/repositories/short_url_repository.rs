//! Repository trait for short URLs.

use crate::domain::entities::{AuthorizationScope, ShortUrl};
use crate::domain::models::ShortUrlIdentifier;
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for short URLs.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgShortUrlRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::InMemoryStore`] - in-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    /// Persists a short URL, inserting it or updating it when it has an id.
    ///
    /// Domain and tags are looked up by name and created when missing.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the short code is taken on its domain.
    /// Returns [`AppError::Internal`] on storage errors.
    async fn save(&self, short_url: ShortUrl) -> Result<ShortUrl, AppError>;

    /// Finds a short URL visible in `scope`, with its current visit count.
    async fn find_one(
        &self,
        identifier: &ShortUrlIdentifier,
        scope: Option<AuthorizationScope>,
    ) -> Result<Option<ShortUrl>, AppError>;

    /// Whether a short URL with this code exists on the domain within `scope`.
    async fn short_code_is_in_use(
        &self,
        identifier: &ShortUrlIdentifier,
        scope: Option<AuthorizationScope>,
    ) -> Result<bool, AppError>;
}
