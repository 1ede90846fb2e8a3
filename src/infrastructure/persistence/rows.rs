//! Row types shared by the PostgreSQL repositories.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::FromRow;

use crate::domain::entities::{AuthorizationScope, Domain, ShortUrl, Tag, Visit, VisitLocation, VisitTarget};
use crate::error::AppError;

/// Columns selected for every visit query.
pub(super) const VISIT_COLUMNS: &str = r#"
    v.id, v.visit_type, v.short_url_id, s.short_code, d.authority AS domain,
    v.referer, v.user_agent, v.remote_addr, v.visited_url, v.visited_at,
    (l.visit_id IS NOT NULL) AS is_located,
    l.country_code, l.country_name, l.region_name, l.city_name,
    l.latitude, l.longitude, l.timezone
"#;

/// Joins needed by [`VISIT_COLUMNS`].
pub(super) const VISIT_JOINS: &str = r#"
    FROM visits v
    LEFT JOIN short_urls s ON s.id = v.short_url_id
    LEFT JOIN domains d ON d.id = s.domain_id
    LEFT JOIN visit_locations l ON l.visit_id = v.id
"#;

/// Splits a scope into the two nullable bind values every scoped query uses.
pub(super) fn scope_binds(scope: &Option<AuthorizationScope>) -> (Option<i64>, Option<i64>) {
    scope
        .as_ref()
        .map(|scope| (scope.author_api_key_id, scope.domain_id))
        .unwrap_or_default()
}

#[derive(Debug, FromRow)]
pub(super) struct VisitRow {
    pub id: i64,
    pub visit_type: String,
    pub short_url_id: Option<i64>,
    pub short_code: Option<String>,
    pub domain: Option<String>,
    pub referer: String,
    pub user_agent: String,
    pub remote_addr: Option<String>,
    pub visited_url: Option<String>,
    pub visited_at: DateTime<Utc>,
    pub is_located: bool,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub city_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
}

impl TryFrom<VisitRow> for Visit {
    type Error = AppError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let target = match (row.visit_type.as_str(), row.short_url_id, row.short_code) {
            ("valid_short_url", Some(short_url_id), Some(short_code)) => VisitTarget::ShortUrl {
                short_url_id,
                short_code,
                domain: row.domain,
            },
            ("base_url", _, _) => VisitTarget::BasePath,
            ("invalid_short_url", _, _) => VisitTarget::InvalidShortUrl,
            ("regular_404", _, _) => VisitTarget::RegularNotFound,
            (other, _, _) => {
                return Err(AppError::internal(
                    "Inconsistent visit row",
                    json!({ "visit_id": row.id, "visit_type": other }),
                ));
            }
        };

        let location = row.is_located.then(|| VisitLocation {
            country_code: row.country_code.unwrap_or_default(),
            country_name: row.country_name.unwrap_or_default(),
            region_name: row.region_name.unwrap_or_default(),
            city_name: row.city_name.unwrap_or_default(),
            latitude: row.latitude.unwrap_or_default(),
            longitude: row.longitude.unwrap_or_default(),
            timezone: row.timezone.unwrap_or_default(),
        });

        Ok(Visit {
            id: row.id,
            referer: row.referer,
            user_agent: row.user_agent,
            remote_addr: row.remote_addr,
            visited_url: row.visited_url,
            visited_at: row.visited_at,
            target,
            location,
        })
    }
}

pub(super) fn into_visits(rows: Vec<VisitRow>) -> Result<Vec<Visit>, AppError> {
    rows.into_iter().map(Visit::try_from).collect()
}

#[derive(Debug, FromRow)]
pub(super) struct ShortUrlRow {
    pub id: i64,
    pub short_code: String,
    pub long_url: String,
    pub date_created: DateTime<Utc>,
    pub domain_id: Option<i64>,
    pub authority: Option<String>,
    pub valid_since: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_visits: Option<i64>,
    pub visits_count: i64,
    pub custom_slug_was_provided: bool,
    pub short_code_length: i32,
    pub import_source: Option<String>,
    pub import_original_short_code: Option<String>,
    pub author_api_key_id: Option<i64>,
    pub title: Option<String>,
    pub title_was_auto_resolved: bool,
}

impl ShortUrlRow {
    pub fn into_short_url(self, tags: Vec<String>) -> ShortUrl {
        let domain = match (self.domain_id, self.authority) {
            (Some(id), Some(authority)) => Some(Domain::persisted(id, authority)),
            _ => None,
        };

        ShortUrl {
            id: Some(self.id),
            long_url: self.long_url,
            short_code: self.short_code,
            date_created: self.date_created,
            domain,
            tags: tags.into_iter().map(Tag::new).collect::<BTreeSet<_>>(),
            valid_since: self.valid_since,
            valid_until: self.valid_until,
            max_visits: self.max_visits,
            visits_count: self.visits_count,
            custom_slug_was_provided: self.custom_slug_was_provided,
            short_code_length: usize::try_from(self.short_code_length).unwrap_or_default(),
            import_source: self.import_source,
            import_original_short_code: self.import_original_short_code,
            author_api_key_id: self.author_api_key_id,
            title: self.title,
            title_was_auto_resolved: self.title_was_auto_resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(visit_type: &str, short_url_id: Option<i64>, is_located: bool) -> VisitRow {
        VisitRow {
            id: 1,
            visit_type: visit_type.to_string(),
            short_url_id,
            short_code: short_url_id.map(|_| "abc12".to_string()),
            domain: None,
            referer: String::new(),
            user_agent: "curl".to_string(),
            remote_addr: Some("1.2.3.0".to_string()),
            visited_url: None,
            visited_at: Utc::now(),
            is_located,
            country_code: is_located.then(|| "ES".to_string()),
            country_name: None,
            region_name: None,
            city_name: None,
            latitude: None,
            longitude: None,
            timezone: None,
        }
    }

    #[test]
    fn test_visit_row_conversion() {
        let visit = Visit::try_from(row("valid_short_url", Some(4), true)).unwrap();

        assert_eq!(visit.target.short_code(), Some("abc12"));
        assert_eq!(visit.location.map(|l| l.country_code), Some("ES".to_string()));

        let orphan = Visit::try_from(row("regular_404", None, false)).unwrap();
        assert!(orphan.is_orphan());
        assert!(orphan.location.is_none());
    }

    #[test]
    fn test_inconsistent_visit_row_is_rejected() {
        assert!(Visit::try_from(row("valid_short_url", None, false)).is_err());
        assert!(Visit::try_from(row("unknown", None, false)).is_err());
    }

    #[test]
    fn test_scope_binds() {
        assert_eq!(scope_binds(&None), (None, None));
        assert_eq!(
            scope_binds(&Some(AuthorizationScope {
                author_api_key_id: Some(2),
                domain_id: None,
            })),
            (Some(2), None)
        );
    }
}
