//! PostgreSQL implementation of the visit repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use super::rows::{VISIT_COLUMNS, VISIT_JOINS, VisitRow, into_visits, scope_binds};
use crate::domain::entities::{AuthorizationScope, NewVisit, Visit, VisitLocation, VisitTarget};
use crate::domain::models::{DateRange, ShortUrlIdentifier};
use crate::domain::repositories::{VisitRepository, VisitsFilter};
use crate::error::AppError;

/// Scope filter over the `s` (short_urls) alias. Binds `$a` author, `$b` domain.
fn scope_clause(author: usize, domain: usize) -> String {
    format!(
        "(${author}::bigint IS NULL OR s.author_api_key_id = ${author}) \
         AND (${domain}::bigint IS NULL OR s.domain_id = ${domain})"
    )
}

/// Date filter over `v.visited_at`. Binds `$a` start, `$b` end.
fn date_clause(start: usize, end: usize) -> String {
    format!(
        "(${start}::timestamptz IS NULL OR v.visited_at >= ${start}) \
         AND (${end}::timestamptz IS NULL OR v.visited_at <= ${end})"
    )
}

const SHORT_CODE_CLAUSE: &str =
    "v.short_url_id IS NOT NULL AND s.short_code = $1 AND d.authority IS NOT DISTINCT FROM $2";

const TAG_CLAUSE: &str = r#"
    v.short_url_id IS NOT NULL AND EXISTS (
        SELECT 1
        FROM short_urls_in_tags st
        JOIN tags t ON t.id = st.tag_id
        WHERE st.short_url_id = v.short_url_id AND t.name = $1
    )
"#;

/// PostgreSQL repository for visits and their locations.
pub struct PgVisitRepository {
    pool: Arc<PgPool>,
}

impl PgVisitRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRepository for PgVisitRepository {
    async fn create(&self, new_visit: NewVisit) -> Result<Visit, AppError> {
        let short_url_id = match &new_visit.target {
            VisitTarget::ShortUrl { short_url_id, .. } => Some(*short_url_id),
            _ => None,
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO visits
                (short_url_id, visit_type, referer, user_agent, remote_addr, visited_url, visited_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(short_url_id)
        .bind(new_visit.target.as_str())
        .bind(&new_visit.referer)
        .bind(&new_visit.user_agent)
        .bind(&new_visit.remote_addr)
        .bind(&new_visit.visited_url)
        .bind(new_visit.visited_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(new_visit.into_visit(id))
    }

    async fn find_by_id(&self, visit_id: i64) -> Result<Option<Visit>, AppError> {
        let row = sqlx::query_as::<_, VisitRow>(&format!(
            "SELECT {VISIT_COLUMNS} {VISIT_JOINS} WHERE v.id = $1"
        ))
        .bind(visit_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Visit::try_from).transpose()
    }

    async fn save_location(&self, visit_id: i64, location: VisitLocation) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO visit_locations
                (visit_id, country_code, country_name, region_name, city_name,
                 latitude, longitude, timezone, is_empty)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (visit_id) DO UPDATE SET
                country_code = EXCLUDED.country_code,
                country_name = EXCLUDED.country_name,
                region_name = EXCLUDED.region_name,
                city_name = EXCLUDED.city_name,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                timezone = EXCLUDED.timezone,
                is_empty = EXCLUDED.is_empty
            "#,
        )
        .bind(visit_id)
        .bind(&location.country_code)
        .bind(&location.country_name)
        .bind(&location.region_name)
        .bind(&location.city_name)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.timezone)
        .bind(location.is_empty())
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_unlocated(&self, limit: i64) -> Result<Vec<Visit>, AppError> {
        let rows = sqlx::query_as::<_, VisitRow>(&format!(
            "SELECT {VISIT_COLUMNS} {VISIT_JOINS} WHERE l.visit_id IS NULL ORDER BY v.id ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        into_visits(rows)
    }

    async fn count_visits(&self, scope: Option<AuthorizationScope>) -> Result<i64, AppError> {
        let (author, domain) = scope_binds(&scope);

        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM visits v JOIN short_urls s ON s.id = v.short_url_id WHERE {}",
            scope_clause(1, 2)
        ))
        .bind(author)
        .bind(domain)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn count_orphan_visits(&self, date_range: DateRange) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM visits v WHERE v.short_url_id IS NULL AND {}",
            date_clause(1, 2)
        ))
        .bind(date_range.start)
        .bind(date_range.end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn find_visits_by_short_code(
        &self,
        identifier: &ShortUrlIdentifier,
        filter: VisitsFilter,
        scope: Option<AuthorizationScope>,
    ) -> Result<Vec<Visit>, AppError> {
        let (author, domain) = scope_binds(&scope);

        let rows = sqlx::query_as::<_, VisitRow>(&format!(
            "SELECT {VISIT_COLUMNS} {VISIT_JOINS} WHERE {SHORT_CODE_CLAUSE} AND {} AND {} \
             ORDER BY v.id DESC LIMIT $7 OFFSET $8",
            scope_clause(3, 4),
            date_clause(5, 6),
        ))
        .bind(&identifier.short_code)
        .bind(&identifier.domain)
        .bind(author)
        .bind(domain)
        .bind(filter.date_range.start)
        .bind(filter.date_range.end)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        into_visits(rows)
    }

    async fn count_visits_by_short_code(
        &self,
        identifier: &ShortUrlIdentifier,
        date_range: DateRange,
        scope: Option<AuthorizationScope>,
    ) -> Result<i64, AppError> {
        let (author, domain) = scope_binds(&scope);

        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) {VISIT_JOINS} WHERE {SHORT_CODE_CLAUSE} AND {} AND {}",
            scope_clause(3, 4),
            date_clause(5, 6),
        ))
        .bind(&identifier.short_code)
        .bind(&identifier.domain)
        .bind(author)
        .bind(domain)
        .bind(date_range.start)
        .bind(date_range.end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn find_visits_by_tag(
        &self,
        tag: &str,
        filter: VisitsFilter,
        scope: Option<AuthorizationScope>,
    ) -> Result<Vec<Visit>, AppError> {
        let (author, domain) = scope_binds(&scope);

        let rows = sqlx::query_as::<_, VisitRow>(&format!(
            "SELECT {VISIT_COLUMNS} {VISIT_JOINS} WHERE {TAG_CLAUSE} AND {} AND {} \
             ORDER BY v.id DESC LIMIT $6 OFFSET $7",
            scope_clause(2, 3),
            date_clause(4, 5),
        ))
        .bind(tag)
        .bind(author)
        .bind(domain)
        .bind(filter.date_range.start)
        .bind(filter.date_range.end)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        into_visits(rows)
    }

    async fn count_visits_by_tag(
        &self,
        tag: &str,
        date_range: DateRange,
        scope: Option<AuthorizationScope>,
    ) -> Result<i64, AppError> {
        let (author, domain) = scope_binds(&scope);

        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) {VISIT_JOINS} WHERE {TAG_CLAUSE} AND {} AND {}",
            scope_clause(2, 3),
            date_clause(4, 5),
        ))
        .bind(tag)
        .bind(author)
        .bind(domain)
        .bind(date_range.start)
        .bind(date_range.end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn find_orphan_visits(&self, filter: VisitsFilter) -> Result<Vec<Visit>, AppError> {
        let rows = sqlx::query_as::<_, VisitRow>(&format!(
            "SELECT {VISIT_COLUMNS} {VISIT_JOINS} WHERE v.short_url_id IS NULL AND {} \
             ORDER BY v.id DESC LIMIT $3 OFFSET $4",
            date_clause(1, 2),
        ))
        .bind(filter.date_range.start)
        .bind(filter.date_range.end)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        into_visits(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_clause_uses_given_placeholders() {
        let clause = scope_clause(3, 4);

        assert!(clause.contains("$3::bigint IS NULL OR s.author_api_key_id = $3"));
        assert!(clause.contains("$4::bigint IS NULL OR s.domain_id = $4"));
    }

    #[test]
    fn test_date_clause_uses_given_placeholders() {
        let clause = date_clause(1, 2);

        assert!(clause.contains("v.visited_at >= $1"));
        assert!(clause.contains("v.visited_at <= $2"));
    }
}
