//! In-process implementation of every repository trait.
//!
//! Backs the integration tests and lets the pipeline run without PostgreSQL.
//! All state lives behind one `RwLock`, so each operation is atomic.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use crate::domain::entities::{
    AuthorizationScope, NewVisit, ShortUrl, Tag, Visit, VisitLocation, VisitTarget,
};
use crate::domain::models::{DateRange, ShortUrlIdentifier};
use crate::domain::repositories::{
    ShortUrlRepository, TagRepository, VisitRepository, VisitsFilter,
};
use crate::error::AppError;

#[derive(Default)]
struct State {
    last_short_url_id: i64,
    last_visit_id: i64,
    domains: BTreeMap<String, i64>,
    tags: BTreeSet<String>,
    short_urls: BTreeMap<i64, ShortUrl>,
    visits: BTreeMap<i64, Visit>,
}

impl State {
    fn is_visible(short_url: &ShortUrl, scope: &Option<AuthorizationScope>) -> bool {
        scope.as_ref().is_none_or(|scope| {
            scope.allows(
                short_url.author_api_key_id(),
                short_url.domain().and_then(|domain| domain.id),
            )
        })
    }

    fn matches(short_url: &ShortUrl, identifier: &ShortUrlIdentifier) -> bool {
        short_url.short_code() == identifier.short_code
            && short_url.authority() == identifier.domain.as_deref()
    }

    fn visits_count(&self, short_url_id: i64) -> i64 {
        self.visits
            .values()
            .filter(|visit| target_id(visit) == Some(short_url_id))
            .count() as i64
    }

    fn find_short_url(
        &self,
        identifier: &ShortUrlIdentifier,
        scope: &Option<AuthorizationScope>,
    ) -> Option<&ShortUrl> {
        self.short_urls
            .values()
            .find(|short_url| Self::matches(short_url, identifier) && Self::is_visible(short_url, scope))
    }

    /// Non-orphan visits whose short URL is visible in `scope` and accepted by `predicate`.
    fn short_url_visits<'a>(
        &'a self,
        scope: &'a Option<AuthorizationScope>,
        predicate: impl Fn(&ShortUrl) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Visit> + 'a {
        self.visits.values().filter(move |visit| {
            target_id(visit)
                .and_then(|id| self.short_urls.get(&id))
                .is_some_and(|short_url| Self::is_visible(short_url, scope) && predicate(short_url))
        })
    }
}

fn target_id(visit: &Visit) -> Option<i64> {
    match visit.target {
        VisitTarget::ShortUrl { short_url_id, .. } => Some(short_url_id),
        _ => None,
    }
}

fn in_range(date_range: DateRange) -> impl Fn(&&Visit) -> bool {
    move |visit| date_range.contains(visit.visited_at)
}

/// Newest first, then offset and limit.
fn page<'a>(visits: impl Iterator<Item = &'a Visit>, filter: VisitsFilter) -> Vec<Visit> {
    let mut visits: Vec<&Visit> = visits.collect();
    visits.sort_by(|a, b| b.id.cmp(&a.id));

    let offset = usize::try_from(filter.offset).unwrap_or_default();
    let limit = filter
        .limit
        .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or_default());

    visits.into_iter().skip(offset).take(limit).cloned().collect()
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShortUrlRepository for InMemoryStore {
    async fn save(&self, mut short_url: ShortUrl) -> Result<ShortUrl, AppError> {
        let mut state = self.state.write().await;

        let identifier = ShortUrlIdentifier::new(
            short_url.short_code(),
            short_url.authority().map(str::to_string),
        );
        let taken = state.short_urls.values().any(|existing| {
            existing.id() != short_url.id() && State::matches(existing, &identifier)
        });
        if taken {
            return Err(AppError::conflict(
                "Short code already in use",
                json!({ "short_code": identifier.short_code, "domain": identifier.domain }),
            ));
        }

        if let Some(domain) = short_url.domain.as_mut()
            && domain.id.is_none()
        {
            let next_id = state.domains.len() as i64 + 1;
            let id = *state
                .domains
                .entry(domain.authority.clone())
                .or_insert(next_id);
            domain.id = Some(id);
        }

        let id = match short_url.id() {
            Some(id) => id,
            None => {
                state.last_short_url_id += 1;
                state.last_short_url_id
            }
        };
        short_url.id = Some(id);

        for tag in short_url.tags() {
            state.tags.insert(tag.name().to_string());
        }
        state.short_urls.insert(id, short_url.clone());

        Ok(short_url.with_visits_count(state.visits_count(id)))
    }

    async fn find_one(
        &self,
        identifier: &ShortUrlIdentifier,
        scope: Option<AuthorizationScope>,
    ) -> Result<Option<ShortUrl>, AppError> {
        let state = self.state.read().await;

        Ok(state.find_short_url(identifier, &scope).map(|short_url| {
            let visits_count = short_url.id().map_or(0, |id| state.visits_count(id));
            short_url.clone().with_visits_count(visits_count)
        }))
    }

    async fn short_code_is_in_use(
        &self,
        identifier: &ShortUrlIdentifier,
        scope: Option<AuthorizationScope>,
    ) -> Result<bool, AppError> {
        let state = self.state.read().await;
        Ok(state.find_short_url(identifier, &scope).is_some())
    }
}

#[async_trait]
impl TagRepository for InMemoryStore {
    async fn tag_exists(
        &self,
        tag: &str,
        scope: Option<AuthorizationScope>,
    ) -> Result<bool, AppError> {
        let state = self.state.read().await;

        if scope.is_none() {
            return Ok(state.tags.contains(tag));
        }

        let tag = Tag::new(tag);
        Ok(state
            .short_urls
            .values()
            .any(|short_url| State::is_visible(short_url, &scope) && short_url.tags().contains(&tag)))
    }
}

#[async_trait]
impl VisitRepository for InMemoryStore {
    async fn create(&self, new_visit: NewVisit) -> Result<Visit, AppError> {
        let mut state = self.state.write().await;

        if let VisitTarget::ShortUrl { short_url_id, .. } = &new_visit.target
            && !state.short_urls.contains_key(short_url_id)
        {
            return Err(AppError::internal(
                "Visit references an unknown short URL",
                json!({ "short_url_id": short_url_id }),
            ));
        }

        state.last_visit_id += 1;
        let visit = new_visit.into_visit(state.last_visit_id);
        state.visits.insert(visit.id, visit.clone());

        Ok(visit)
    }

    async fn find_by_id(&self, visit_id: i64) -> Result<Option<Visit>, AppError> {
        Ok(self.state.read().await.visits.get(&visit_id).cloned())
    }

    async fn save_location(&self, visit_id: i64, location: VisitLocation) -> Result<(), AppError> {
        let mut state = self.state.write().await;

        let visit = state.visits.get_mut(&visit_id).ok_or_else(|| {
            AppError::internal("Visit not found", json!({ "visit_id": visit_id }))
        })?;
        visit.location = Some(location);

        Ok(())
    }

    async fn find_unlocated(&self, limit: i64) -> Result<Vec<Visit>, AppError> {
        let state = self.state.read().await;
        let limit = usize::try_from(limit).unwrap_or_default();

        Ok(state
            .visits
            .values()
            .filter(|visit| !visit.is_located())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_visits(&self, scope: Option<AuthorizationScope>) -> Result<i64, AppError> {
        let state = self.state.read().await;
        Ok(state.short_url_visits(&scope, |_| true).count() as i64)
    }

    async fn count_orphan_visits(&self, date_range: DateRange) -> Result<i64, AppError> {
        let state = self.state.read().await;

        Ok(state
            .visits
            .values()
            .filter(|visit| visit.is_orphan())
            .filter(in_range(date_range))
            .count() as i64)
    }

    async fn find_visits_by_short_code(
        &self,
        identifier: &ShortUrlIdentifier,
        filter: VisitsFilter,
        scope: Option<AuthorizationScope>,
    ) -> Result<Vec<Visit>, AppError> {
        let state = self.state.read().await;
        let visits = state
            .short_url_visits(&scope, |short_url| State::matches(short_url, identifier))
            .filter(in_range(filter.date_range));

        Ok(page(visits, filter))
    }

    async fn count_visits_by_short_code(
        &self,
        identifier: &ShortUrlIdentifier,
        date_range: DateRange,
        scope: Option<AuthorizationScope>,
    ) -> Result<i64, AppError> {
        let state = self.state.read().await;

        Ok(state
            .short_url_visits(&scope, |short_url| State::matches(short_url, identifier))
            .filter(in_range(date_range))
            .count() as i64)
    }

    async fn find_visits_by_tag(
        &self,
        tag: &str,
        filter: VisitsFilter,
        scope: Option<AuthorizationScope>,
    ) -> Result<Vec<Visit>, AppError> {
        let state = self.state.read().await;
        let tag = Tag::new(tag);
        let visits = state
            .short_url_visits(&scope, |short_url| short_url.tags().contains(&tag))
            .filter(in_range(filter.date_range));

        Ok(page(visits, filter))
    }

    async fn count_visits_by_tag(
        &self,
        tag: &str,
        date_range: DateRange,
        scope: Option<AuthorizationScope>,
    ) -> Result<i64, AppError> {
        let state = self.state.read().await;
        let tag = Tag::new(tag);

        Ok(state
            .short_url_visits(&scope, |short_url| short_url.tags().contains(&tag))
            .filter(in_range(date_range))
            .count() as i64)
    }

    async fn find_orphan_visits(&self, filter: VisitsFilter) -> Result<Vec<Visit>, AppError> {
        let state = self.state.read().await;
        let visits = state
            .visits
            .values()
            .filter(|visit| visit.is_orphan())
            .filter(in_range(filter.date_range));

        Ok(page(visits, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ShortUrlMeta, Visitor};

    fn meta(custom_slug: &str, domain: Option<&str>) -> ShortUrlMeta {
        ShortUrlMeta {
            custom_slug: Some(custom_slug.to_string()),
            domain: domain.map(String::from),
            ..ShortUrlMeta::with_long_url("https://example.com")
        }
    }

    #[tokio::test]
    async fn test_save_assigns_ids() {
        let store = InMemoryStore::new();

        let saved = store
            .save(ShortUrl::from_meta(meta("abc", Some("s.example.com")), None))
            .await
            .unwrap();

        assert_eq!(saved.id(), Some(1));
        assert_eq!(saved.domain().and_then(|d| d.id), Some(1));
    }

    #[tokio::test]
    async fn test_same_code_allowed_once_per_domain() {
        let store = InMemoryStore::new();

        store.save(ShortUrl::from_meta(meta("abc", None), None)).await.unwrap();
        store
            .save(ShortUrl::from_meta(meta("abc", Some("s.example.com")), None))
            .await
            .unwrap();
        let duplicate = store.save(ShortUrl::from_meta(meta("abc", None), None)).await;

        assert!(matches!(duplicate, Err(AppError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_find_one_respects_scope_and_counts_visits() {
        let store = InMemoryStore::new();
        let mut short_url = ShortUrl::from_meta(meta("abc", None), None);
        short_url.author_api_key_id = Some(7);
        let short_url = store.save(short_url).await.unwrap();

        let visit = NewVisit::for_valid_short_url(&short_url, &Visitor::empty(), false).unwrap();
        store.create(visit).await.unwrap();

        let identifier = ShortUrlIdentifier::for_default_domain("abc");
        let owner = Some(AuthorizationScope {
            author_api_key_id: Some(7),
            domain_id: None,
        });
        let stranger = Some(AuthorizationScope {
            author_api_key_id: Some(8),
            domain_id: None,
        });

        let found = store.find_one(&identifier, owner).await.unwrap().unwrap();
        assert_eq!(found.visits_count(), 1);
        assert!(store.find_one(&identifier, stranger).await.unwrap().is_none());
        assert!(store.find_one(&identifier, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_location_last_write_wins() {
        let store = InMemoryStore::new();
        let visit = store
            .create(NewVisit::for_base_path(&Visitor::empty(), false))
            .await
            .unwrap();

        store.save_location(visit.id, VisitLocation::empty()).await.unwrap();
        let located = VisitLocation {
            country_code: "FR".to_string(),
            ..VisitLocation::empty()
        };
        store.save_location(visit.id, located.clone()).await.unwrap();

        let stored = store.find_by_id(visit.id).await.unwrap().unwrap();
        assert_eq!(stored.location, Some(located));
        assert!(store.find_unlocated(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orphan_visits_are_paged_newest_first() {
        let store = InMemoryStore::new();
        for _ in 0..5 {
            store
                .create(NewVisit::for_regular_not_found(&Visitor::empty(), false))
                .await
                .unwrap();
        }

        let visits = store
            .find_orphan_visits(VisitsFilter::new(1, Some(2)))
            .await
            .unwrap();

        let ids: Vec<i64> = visits.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![4, 3]);
        assert_eq!(store.count_orphan_visits(DateRange::all()).await.unwrap(), 5);
        assert_eq!(store.count_visits(None).await.unwrap(), 0);
    }
}
