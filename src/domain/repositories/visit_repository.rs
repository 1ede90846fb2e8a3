//! Repository trait for recorded visits and their locations.

use crate::domain::entities::{AuthorizationScope, NewVisit, Visit, VisitLocation};
use crate::domain::models::{DateRange, ShortUrlIdentifier, VisitsParams};
use crate::error::AppError;
use async_trait::async_trait;

/// Filter criteria for visit listings.
///
/// `limit: None` returns every visit from `offset` on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitsFilter {
    pub date_range: DateRange,
    pub offset: i64,
    pub limit: Option<i64>,
}

impl VisitsFilter {
    pub fn new(offset: i64, limit: Option<i64>) -> Self {
        Self {
            date_range: DateRange::all(),
            offset,
            limit,
        }
    }

    /// Adds date range filtering to the query.
    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }
}

impl From<&VisitsParams> for VisitsFilter {
    fn from(params: &VisitsParams) -> Self {
        let (offset, limit) = params.offset_limit();
        Self::new(offset, limit).with_date_range(params.date_range)
    }
}

/// Repository interface for visits.
///
/// Listings are ordered newest first (descending id), which keeps pages
/// stable for a fixed snapshot.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgVisitRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::InMemoryStore`] - in-process implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Records a new visit and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn create(&self, new_visit: NewVisit) -> Result<Visit, AppError>;

    async fn find_by_id(&self, visit_id: i64) -> Result<Option<Visit>, AppError>;

    /// Stores the location of a visit and commits it.
    ///
    /// Storing a location for an already located visit replaces it.
    async fn save_location(&self, visit_id: i64, location: VisitLocation) -> Result<(), AppError>;

    /// Visits that were never located, oldest first.
    async fn find_unlocated(&self, limit: i64) -> Result<Vec<Visit>, AppError>;

    /// Counts non-orphan visits whose short URL is visible in `scope`.
    async fn count_visits(&self, scope: Option<AuthorizationScope>) -> Result<i64, AppError>;

    async fn count_orphan_visits(&self, date_range: DateRange) -> Result<i64, AppError>;

    async fn find_visits_by_short_code(
        &self,
        identifier: &ShortUrlIdentifier,
        filter: VisitsFilter,
        scope: Option<AuthorizationScope>,
    ) -> Result<Vec<Visit>, AppError>;

    async fn count_visits_by_short_code(
        &self,
        identifier: &ShortUrlIdentifier,
        date_range: DateRange,
        scope: Option<AuthorizationScope>,
    ) -> Result<i64, AppError>;

    async fn find_visits_by_tag(
        &self,
        tag: &str,
        filter: VisitsFilter,
        scope: Option<AuthorizationScope>,
    ) -> Result<Vec<Visit>, AppError>;

    async fn count_visits_by_tag(
        &self,
        tag: &str,
        date_range: DateRange,
        scope: Option<AuthorizationScope>,
    ) -> Result<i64, AppError>;

    async fn find_orphan_visits(&self, filter: VisitsFilter) -> Result<Vec<Visit>, AppError>;
}
