//! Read-side aggregation of visit statistics.

use std::sync::Arc;

use crate::domain::entities::{AuthorizationScope, Visit};
use crate::domain::models::{DateRange, Paginator, ShortUrlIdentifier, VisitsParams};
use crate::domain::repositories::{
    ShortUrlRepository, TagRepository, VisitRepository, VisitsFilter,
};
use crate::error::AppError;

/// Visit totals, recomputed on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitsStats {
    pub total: i64,
    pub orphan_total: i64,
}

/// Service for counting and listing visits.
///
/// Listings are paginated with [`VisitsParams`] and optionally restricted to
/// an [`AuthorizationScope`].
pub struct VisitsStatsService<S, T, V>
where
    S: ShortUrlRepository,
    T: TagRepository,
    V: VisitRepository,
{
    short_urls: Arc<S>,
    tags: Arc<T>,
    visits: Arc<V>,
}

impl<S, T, V> VisitsStatsService<S, T, V>
where
    S: ShortUrlRepository,
    T: TagRepository,
    V: VisitRepository,
{
    pub fn new(short_urls: Arc<S>, tags: Arc<T>, visits: Arc<V>) -> Self {
        Self {
            short_urls,
            tags,
            visits,
        }
    }

    /// Total visits visible in `scope`, plus the (unscoped) orphan total.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn visits_stats(
        &self,
        scope: Option<AuthorizationScope>,
    ) -> Result<VisitsStats, AppError> {
        let (total, orphan_total) = tokio::try_join!(
            self.visits.count_visits(scope),
            self.visits.count_orphan_visits(DateRange::all()),
        )?;

        Ok(VisitsStats {
            total,
            orphan_total,
        })
    }

    /// Lists the visits of one short URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ShortUrlNotFound`] if no short URL matches the
    /// identifier within `scope`.
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn visits_for_short_url(
        &self,
        identifier: &ShortUrlIdentifier,
        params: &VisitsParams,
        scope: Option<AuthorizationScope>,
    ) -> Result<Paginator<Visit>, AppError> {
        if !self
            .short_urls
            .short_code_is_in_use(identifier, scope.clone())
            .await?
        {
            return Err(AppError::short_url_not_found(
                identifier.short_code.clone(),
                identifier.domain.clone(),
            ));
        }

        let (items, total) = tokio::try_join!(
            self.visits
                .find_visits_by_short_code(identifier, VisitsFilter::from(params), scope.clone()),
            self.visits
                .count_visits_by_short_code(identifier, params.date_range, scope),
        )?;

        Ok(Paginator::new(items, params, total))
    }

    /// Lists the visits of every short URL carrying `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::TagNotFound`] if the tag does not exist within
    /// `scope`.
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn visits_for_tag(
        &self,
        tag: &str,
        params: &VisitsParams,
        scope: Option<AuthorizationScope>,
    ) -> Result<Paginator<Visit>, AppError> {
        if !self.tags.tag_exists(tag, scope.clone()).await? {
            return Err(AppError::tag_not_found(tag));
        }

        let (items, total) = tokio::try_join!(
            self.visits
                .find_visits_by_tag(tag, VisitsFilter::from(params), scope.clone()),
            self.visits.count_visits_by_tag(tag, params.date_range, scope),
        )?;

        Ok(Paginator::new(items, params, total))
    }

    /// Lists orphan visits. Never fails for lack of a matching entity.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn orphan_visits(&self, params: &VisitsParams) -> Result<Paginator<Visit>, AppError> {
        let (items, total) = tokio::try_join!(
            self.visits.find_orphan_visits(VisitsFilter::from(params)),
            self.visits.count_orphan_visits(params.date_range),
        )?;

        Ok(Paginator::new(items, params, total))
    }
}
