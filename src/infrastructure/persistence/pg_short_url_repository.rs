//! PostgreSQL implementation of the short URL repository.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

use super::rows::{ShortUrlRow, scope_binds};
use crate::domain::entities::{AuthorizationScope, Domain, ShortUrl};
use crate::domain::models::ShortUrlIdentifier;
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;

const SHORT_URL_SELECT: &str = r#"
    SELECT
        s.id, s.short_code, s.long_url, s.date_created, s.domain_id,
        d.authority, s.valid_since, s.valid_until, s.max_visits,
        (SELECT COUNT(*) FROM visits v WHERE v.short_url_id = s.id) AS visits_count,
        s.custom_slug_was_provided, s.short_code_length,
        s.import_source, s.import_original_short_code,
        s.author_api_key_id, s.title, s.title_was_auto_resolved
    FROM short_urls s
    LEFT JOIN domains d ON d.id = s.domain_id
    WHERE s.short_code = $1
      AND d.authority IS NOT DISTINCT FROM $2
      AND ($3::bigint IS NULL OR s.author_api_key_id = $3)
      AND ($4::bigint IS NULL OR s.domain_id = $4)
"#;

/// PostgreSQL repository for short URLs, their domain and their tags.
pub struct PgShortUrlRepository {
    pool: Arc<PgPool>,
}

impl PgShortUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn resolve_domain(
        tx: &mut Transaction<'_, Postgres>,
        domain: &Domain,
    ) -> Result<i64, AppError> {
        if let Some(id) = domain.id {
            return Ok(id);
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO domains (authority) VALUES ($1)
            ON CONFLICT (authority) DO UPDATE SET authority = EXCLUDED.authority
            RETURNING id
            "#,
        )
        .bind(&domain.authority)
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }

    async fn replace_tags(
        tx: &mut Transaction<'_, Postgres>,
        short_url_id: i64,
        short_url: &ShortUrl,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM short_urls_in_tags WHERE short_url_id = $1")
            .bind(short_url_id)
            .execute(&mut **tx)
            .await?;

        for tag in short_url.tags() {
            sqlx::query(
                r#"
                WITH tag AS (
                    INSERT INTO tags (name) VALUES ($2)
                    ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                    RETURNING id
                )
                INSERT INTO short_urls_in_tags (short_url_id, tag_id)
                SELECT $1, id FROM tag
                "#,
            )
            .bind(short_url_id)
            .bind(tag.name())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn load_tags(&self, short_url_id: i64) -> Result<Vec<String>, AppError> {
        let tags: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.name
            FROM tags t
            JOIN short_urls_in_tags st ON st.tag_id = t.id
            WHERE st.short_url_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(short_url_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(tags)
    }
}

#[async_trait]
impl ShortUrlRepository for PgShortUrlRepository {
    async fn save(&self, mut short_url: ShortUrl) -> Result<ShortUrl, AppError> {
        let mut tx = self.pool.begin().await?;

        let domain_id = match short_url.domain() {
            Some(domain) => Some(Self::resolve_domain(&mut tx, domain).await?),
            None => None,
        };
        let short_code_length = i32::try_from(short_url.short_code_length).unwrap_or(i32::MAX);

        let id: i64 = match short_url.id() {
            None => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO short_urls
                        (short_code, long_url, date_created, domain_id, valid_since, valid_until,
                         max_visits, custom_slug_was_provided, short_code_length, import_source,
                         import_original_short_code, author_api_key_id, title,
                         title_was_auto_resolved)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                    RETURNING id
                    "#,
                )
                .bind(short_url.short_code())
                .bind(short_url.long_url())
                .bind(short_url.date_created())
                .bind(domain_id)
                .bind(short_url.valid_since())
                .bind(short_url.valid_until())
                .bind(short_url.max_visits())
                .bind(short_url.custom_slug_was_provided())
                .bind(short_code_length)
                .bind(short_url.import_source())
                .bind(short_url.import_original_short_code())
                .bind(short_url.author_api_key_id())
                .bind(short_url.title())
                .bind(short_url.title_was_auto_resolved())
                .fetch_one(&mut *tx)
                .await?
            }
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE short_urls SET
                        long_url = $2, valid_since = $3, valid_until = $4, max_visits = $5,
                        title = $6, title_was_auto_resolved = $7
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(short_url.long_url())
                .bind(short_url.valid_since())
                .bind(short_url.valid_until())
                .bind(short_url.max_visits())
                .bind(short_url.title())
                .bind(short_url.title_was_auto_resolved())
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        Self::replace_tags(&mut tx, id, &short_url).await?;
        tx.commit().await?;

        short_url.id = Some(id);
        if let (Some(domain), Some(domain_id)) = (short_url.domain.as_mut(), domain_id) {
            domain.id = Some(domain_id);
        }

        tracing::debug!(short_url_id = id, short_code = %short_url.short_code(), "Short URL saved");
        Ok(short_url)
    }

    async fn find_one(
        &self,
        identifier: &ShortUrlIdentifier,
        scope: Option<AuthorizationScope>,
    ) -> Result<Option<ShortUrl>, AppError> {
        let (author, domain) = scope_binds(&scope);

        let row = sqlx::query_as::<_, ShortUrlRow>(SHORT_URL_SELECT)
            .bind(&identifier.short_code)
            .bind(&identifier.domain)
            .bind(author)
            .bind(domain)
            .fetch_optional(self.pool.as_ref())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags = self.load_tags(row.id).await?;
        Ok(Some(row.into_short_url(tags)))
    }

    async fn short_code_is_in_use(
        &self,
        identifier: &ShortUrlIdentifier,
        scope: Option<AuthorizationScope>,
    ) -> Result<bool, AppError> {
        let (author, domain) = scope_binds(&scope);

        let in_use: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM short_urls s
                LEFT JOIN domains d ON d.id = s.domain_id
                WHERE s.short_code = $1
                  AND d.authority IS NOT DISTINCT FROM $2
                  AND ($3::bigint IS NULL OR s.author_api_key_id = $3)
                  AND ($4::bigint IS NULL OR s.domain_id = $4)
            )
            "#,
        )
        .bind(&identifier.short_code)
        .bind(&identifier.domain)
        .bind(author)
        .bind(domain)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(in_use)
    }
}
