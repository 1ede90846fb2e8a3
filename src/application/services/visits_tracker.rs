//! Synchronous visit recording, the entry point of the visit pipeline.

use std::sync::Arc;

use crate::domain::entities::{NewVisit, ShortUrl, Visit};
use crate::domain::models::Visitor;
use crate::domain::repositories::VisitRepository;
use crate::domain::visit_event::{EventDispatcher, VisitOccurred};
use crate::error::AppError;

/// Privacy and scope switches for visit recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingOptions {
    /// Store addresses with the host part zeroed.
    pub anonymize_remote_addr: bool,
    /// Record base-path, invalid short code and not-found hits.
    pub track_orphan_visits: bool,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            anonymize_remote_addr: true,
            track_orphan_visits: true,
        }
    }
}

/// Records visits and hands them to the asynchronous pipeline.
///
/// Each recorded visit dispatches one [`VisitOccurred`] carrying the visitor's
/// original address, so the location stage is not limited to the anonymized
/// one that gets stored.
pub struct VisitsTracker<V: VisitRepository, D: EventDispatcher> {
    visits: Arc<V>,
    dispatcher: Arc<D>,
    options: TrackingOptions,
}

impl<V: VisitRepository, D: EventDispatcher> VisitsTracker<V, D> {
    pub fn new(visits: Arc<V>, dispatcher: Arc<D>, options: TrackingOptions) -> Self {
        Self {
            visits,
            dispatcher,
            options,
        }
    }

    /// Records a visit to a persisted short URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the short URL has no id or the visit
    /// cannot be stored.
    pub async fn track(&self, short_url: &ShortUrl, visitor: &Visitor) -> Result<Visit, AppError> {
        let new_visit =
            NewVisit::for_valid_short_url(short_url, visitor, self.options.anonymize_remote_addr)?;

        self.record(new_visit, visitor).await
    }

    /// Records a hit on the base URL. Returns `None` when orphan tracking is off.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the visit cannot be stored.
    pub async fn track_base_url_visit(&self, visitor: &Visitor) -> Result<Option<Visit>, AppError> {
        self.track_orphan(
            NewVisit::for_base_path(visitor, self.options.anonymize_remote_addr),
            visitor,
        )
        .await
    }

    /// Records a hit on a short code that matched no enabled short URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the visit cannot be stored.
    pub async fn track_invalid_short_url_visit(
        &self,
        visitor: &Visitor,
    ) -> Result<Option<Visit>, AppError> {
        self.track_orphan(
            NewVisit::for_invalid_short_url(visitor, self.options.anonymize_remote_addr),
            visitor,
        )
        .await
    }

    /// Records a hit on any other not-found path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the visit cannot be stored.
    pub async fn track_regular_not_found_visit(
        &self,
        visitor: &Visitor,
    ) -> Result<Option<Visit>, AppError> {
        self.track_orphan(
            NewVisit::for_regular_not_found(visitor, self.options.anonymize_remote_addr),
            visitor,
        )
        .await
    }

    async fn track_orphan(
        &self,
        new_visit: NewVisit,
        visitor: &Visitor,
    ) -> Result<Option<Visit>, AppError> {
        if !self.options.track_orphan_visits {
            return Ok(None);
        }

        self.record(new_visit, visitor).await.map(Some)
    }

    async fn record(&self, new_visit: NewVisit, visitor: &Visitor) -> Result<Visit, AppError> {
        let visit = self.visits.create(new_visit).await?;

        tracing::debug!(visit_id = visit.id, target = visit.target.as_str(), "Visit recorded");

        self.dispatcher
            .dispatch(VisitOccurred::new(visit.id, visitor.remote_address.clone()).into())
            .await;

        Ok(visit)
    }
}
