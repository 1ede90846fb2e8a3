//! PostgreSQL implementation of the tag repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use super::rows::scope_binds;
use crate::domain::entities::AuthorizationScope;
use crate::domain::repositories::TagRepository;
use crate::error::AppError;

pub struct PgTagRepository {
    pool: Arc<PgPool>,
}

impl PgTagRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn tag_exists(
        &self,
        tag: &str,
        scope: Option<AuthorizationScope>,
    ) -> Result<bool, AppError> {
        let (author, domain) = scope_binds(&scope);

        // Unrestricted callers see every tag, restricted ones only tags in use
        // by short URLs they can see.
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM tags t
                WHERE t.name = $1
                  AND (
                    ($2::bigint IS NULL AND $3::bigint IS NULL)
                    OR EXISTS (
                        SELECT 1
                        FROM short_urls_in_tags st
                        JOIN short_urls s ON s.id = st.short_url_id
                        WHERE st.tag_id = t.id
                          AND ($2::bigint IS NULL OR s.author_api_key_id = $2)
                          AND ($3::bigint IS NULL OR s.domain_id = $3)
                    )
                  )
            )
            "#,
        )
        .bind(tag)
        .bind(author)
        .bind(domain)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }
}
