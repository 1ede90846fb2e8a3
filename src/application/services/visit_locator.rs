//! Location stage of the visit pipeline.
//!
//! Consumes [`VisitOccurred`], resolves the visit's address to a location,
//! persists it and dispatches [`VisitLocated`]. Every exit path of
//! [`VisitLocator::handle`] dispatches exactly one [`VisitLocated`], including
//! the ones where the visit is missing or no location could be stored.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::entities::VisitLocation;
use crate::domain::repositories::VisitRepository;
use crate::domain::visit_event::{EventDispatcher, VisitLocated, VisitOccurred, VisitOccurredListener};
use crate::error::AppError;
use crate::infrastructure::geolocation::{GeolocationDbUpdater, IpLocationError, IpLocationResolver};
use crate::utils::ip_address::is_locatable;

/// How the location stage ended for one visit.
#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
    /// No visit with the event's id exists.
    VisitNotFound,
    /// A location (possibly [`VisitLocation::empty`]) was stored.
    Located(VisitLocation),
    /// Nothing was stored; the visit stays unlocated for a later sweep.
    NotLocated,
}

impl LocateOutcome {
    fn label(&self) -> &'static str {
        match self {
            LocateOutcome::VisitNotFound => "visit_not_found",
            LocateOutcome::Located(location) if location.is_empty() => "empty",
            LocateOutcome::Located(_) => "located",
            LocateOutcome::NotLocated => "not_located",
        }
    }
}

/// The location stage.
pub struct VisitLocator<V, R, U, D>
where
    V: VisitRepository,
    R: IpLocationResolver,
    U: GeolocationDbUpdater,
    D: EventDispatcher,
{
    visits: Arc<V>,
    resolver: Arc<R>,
    db_updater: Arc<U>,
    dispatcher: Arc<D>,
}

impl<V, R, U, D> VisitLocator<V, R, U, D>
where
    V: VisitRepository,
    R: IpLocationResolver,
    U: GeolocationDbUpdater,
    D: EventDispatcher,
{
    pub fn new(visits: Arc<V>, resolver: Arc<R>, db_updater: Arc<U>, dispatcher: Arc<D>) -> Self {
        Self {
            visits,
            resolver,
            db_updater,
            dispatcher,
        }
    }

    /// Locates the visit referenced by `event`, then dispatches [`VisitLocated`].
    ///
    /// The event's `original_ip_address` takes precedence over the stored
    /// (possibly anonymized) address. Never fails: every failure is logged and
    /// reflected in the returned outcome.
    pub async fn handle(&self, event: VisitOccurred) -> LocateOutcome {
        let visit_id = event.visit_id;

        let outcome = match self.visits.find_by_id(visit_id).await {
            Ok(Some(visit)) => {
                let address = event.original_ip_address.or(visit.remote_addr);
                self.locate_visit(visit_id, address.as_deref()).await
            }
            Ok(None) => {
                tracing::warn!(visit_id, "Tried to locate visit, but it does not exist");
                LocateOutcome::VisitNotFound
            }
            Err(e) => {
                tracing::error!(visit_id, error = %e, "Failed to load visit to locate");
                LocateOutcome::NotLocated
            }
        };

        metrics::counter!("visits_located_total", "outcome" => outcome.label()).increment(1);

        self.dispatcher
            .dispatch(VisitLocated::new(visit_id).into())
            .await;

        outcome
    }

    /// Applies the location state machine to visits never located before.
    ///
    /// Uses each visit's stored address. Does not dispatch [`VisitLocated`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the unlocated visits cannot be loaded.
    pub async fn locate_unlocated_visits(&self, batch_size: i64) -> Result<usize, AppError> {
        let visits = self.visits.find_unlocated(batch_size).await?;
        let mut located = 0;

        for visit in visits {
            let outcome = self
                .locate_visit(visit.id, visit.remote_addr.as_deref())
                .await;
            if matches!(outcome, LocateOutcome::Located(_)) {
                located += 1;
            }
        }

        if located > 0 {
            tracing::info!(located, "Located pending visits");
        }
        Ok(located)
    }

    async fn locate_visit(&self, visit_id: i64, address: Option<&str>) -> LocateOutcome {
        let address = match address {
            Some(address) if is_locatable(Some(address)) => address,
            _ => return self.persist(visit_id, VisitLocation::empty()).await,
        };

        if let Err(e) = self.db_updater.check_db_update().await {
            if !e.is_usable() {
                tracing::error!(
                    visit_id,
                    error = ?e,
                    "GeoLite2 database download failed. It is not possible to locate visit"
                );
                return LocateOutcome::NotLocated;
            }

            tracing::warn!(
                visit_id,
                error = ?e,
                "GeoLite2 database update failed. Proceeding with old version"
            );
        }

        let location = match self.resolver.resolve_ip_location(address).await {
            Ok(location) => location,
            Err(e @ IpLocationError::MalformedAddress { .. }) => {
                tracing::warn!(visit_id, error = %e, "Tried to locate visit with invalid IP");
                VisitLocation::empty()
            }
            Err(e @ IpLocationError::DatabaseUnavailable(_)) => {
                tracing::error!(visit_id, error = %e, "It is not possible to locate visit");
                return LocateOutcome::NotLocated;
            }
        };

        self.persist(visit_id, location).await
    }

    async fn persist(&self, visit_id: i64, location: VisitLocation) -> LocateOutcome {
        match self.visits.save_location(visit_id, location.clone()).await {
            Ok(()) => LocateOutcome::Located(location),
            Err(e) => {
                tracing::error!(visit_id, error = %e, "Failed to store visit location");
                LocateOutcome::NotLocated
            }
        }
    }
}

#[async_trait]
impl<V, R, U, D> VisitOccurredListener for VisitLocator<V, R, U, D>
where
    V: VisitRepository,
    R: IpLocationResolver,
    U: GeolocationDbUpdater,
    D: EventDispatcher,
{
    async fn on_visit_occurred(&self, event: VisitOccurred) {
        self.handle(event).await;
    }
}

/// Runs [`VisitLocator::locate_unlocated_visits`] every `period` until shutdown.
pub async fn run_locate_sweep<V, R, U, D>(
    locator: Arc<VisitLocator<V, R, U, D>>,
    period: Duration,
    batch_size: i64,
    mut shutdown: watch::Receiver<bool>,
) where
    V: VisitRepository,
    R: IpLocationResolver,
    U: GeolocationDbUpdater,
    D: EventDispatcher,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = locator.locate_unlocated_visits(batch_size).await {
                    tracing::error!(error = %e, "Failed to locate pending visits");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Shutdown signal received, stopping locate sweep");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{NewVisit, Visit};
    use crate::domain::models::Visitor;
    use crate::domain::repositories::MockVisitRepository;
    use crate::domain::visit_event::{MockEventDispatcher, VisitEvent};
    use crate::infrastructure::geolocation::{
        GeolocationDbUpdateError, MockGeolocationDbUpdater, MockIpLocationResolver,
    };
    use anyhow::anyhow;

    type Locator = VisitLocator<
        MockVisitRepository,
        MockIpLocationResolver,
        MockGeolocationDbUpdater,
        MockEventDispatcher,
    >;

    fn visit(id: i64, remote_addr: Option<&str>) -> Visit {
        let visitor = Visitor::new(Some("Mozilla/5.0"), None, remote_addr.map(String::from), None);
        NewVisit::for_base_path(&visitor, false).into_visit(id)
    }

    fn madrid() -> VisitLocation {
        VisitLocation {
            country_code: "ES".to_string(),
            country_name: "Spain".to_string(),
            region_name: "Madrid".to_string(),
            city_name: "Madrid".to_string(),
            latitude: 40.4,
            longitude: -3.7,
            timezone: "Europe/Madrid".to_string(),
        }
    }

    fn dispatcher_expecting_located(visit_id: i64) -> MockEventDispatcher {
        let mut dispatcher = MockEventDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(move |event| *event == VisitEvent::Located(VisitLocated::new(visit_id)))
            .times(1)
            .returning(|_| ());
        dispatcher
    }

    fn repo_with_visit(visit: Visit) -> MockVisitRepository {
        let visit_id = visit.id;
        let mut repo = MockVisitRepository::new();
        repo.expect_find_by_id()
            .withf(move |id| *id == visit_id)
            .times(1)
            .returning(move |_| Ok(Some(visit.clone())));
        repo
    }

    fn locator(
        repo: MockVisitRepository,
        resolver: MockIpLocationResolver,
        updater: MockGeolocationDbUpdater,
        dispatcher: MockEventDispatcher,
    ) -> Locator {
        VisitLocator::new(
            Arc::new(repo),
            Arc::new(resolver),
            Arc::new(updater),
            Arc::new(dispatcher),
        )
    }

    #[tokio::test]
    async fn test_missing_visit_still_dispatches_located() {
        let mut repo = MockVisitRepository::new();
        repo.expect_find_by_id().times(1).returning(|_| Ok(None));

        let locator = locator(
            repo,
            MockIpLocationResolver::new(),
            MockGeolocationDbUpdater::new(),
            dispatcher_expecting_located(10),
        );

        let outcome = locator.handle(VisitOccurred::new(10, None)).await;

        assert_eq!(outcome, LocateOutcome::VisitNotFound);
    }

    #[tokio::test]
    async fn test_unusable_addresses_store_empty_location_without_lookup() {
        for address in [None, Some(""), Some("127.0.0.1"), Some("::1"), Some("localhost")] {
            let mut repo = repo_with_visit(visit(1, address));
            repo.expect_save_location()
                .withf(|id, location| *id == 1 && location.is_empty())
                .times(1)
                .returning(|_, _| Ok(()));

            // No expectations: any resolver or updater call fails the test.
            let locator = locator(
                repo,
                MockIpLocationResolver::new(),
                MockGeolocationDbUpdater::new(),
                dispatcher_expecting_located(1),
            );

            let outcome = locator.handle(VisitOccurred::new(1, None)).await;

            assert_eq!(outcome, LocateOutcome::Located(VisitLocation::empty()));
        }
    }

    #[tokio::test]
    async fn test_resolved_location_is_stored() {
        let mut repo = repo_with_visit(visit(2, Some("80.12.34.56")));
        repo.expect_save_location()
            .withf(|id, location| *id == 2 && *location == madrid())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut updater = MockGeolocationDbUpdater::new();
        updater.expect_check_db_update().times(1).returning(|| Ok(()));

        let mut resolver = MockIpLocationResolver::new();
        resolver
            .expect_resolve_ip_location()
            .withf(|address| address == "80.12.34.56")
            .times(1)
            .returning(|_| Ok(madrid()));

        let locator = locator(repo, resolver, updater, dispatcher_expecting_located(2));

        let outcome = locator.handle(VisitOccurred::new(2, None)).await;

        assert_eq!(outcome, LocateOutcome::Located(madrid()));
    }

    #[tokio::test]
    async fn test_original_address_takes_precedence() {
        let mut repo = repo_with_visit(visit(3, Some("80.12.34.0")));
        repo.expect_save_location().times(1).returning(|_, _| Ok(()));

        let mut updater = MockGeolocationDbUpdater::new();
        updater.expect_check_db_update().times(1).returning(|| Ok(()));

        let mut resolver = MockIpLocationResolver::new();
        resolver
            .expect_resolve_ip_location()
            .withf(|address| address == "80.12.34.56")
            .times(1)
            .returning(|_| Ok(madrid()));

        let locator = locator(repo, resolver, updater, dispatcher_expecting_located(3));

        locator
            .handle(VisitOccurred::new(3, Some("80.12.34.56".to_string())))
            .await;
    }

    #[tokio::test]
    async fn test_malformed_address_stores_empty_location() {
        let mut repo = repo_with_visit(visit(4, Some("not-an-ip")));
        repo.expect_save_location()
            .withf(|id, location| *id == 4 && location.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut updater = MockGeolocationDbUpdater::new();
        updater.expect_check_db_update().times(1).returning(|| Ok(()));

        let mut resolver = MockIpLocationResolver::new();
        resolver.expect_resolve_ip_location().times(1).returning(|address| {
            Err(IpLocationError::MalformedAddress {
                address: address.to_string(),
                reason: "invalid IP address syntax".to_string(),
            })
        });

        let locator = locator(repo, resolver, updater, dispatcher_expecting_located(4));

        let outcome = locator.handle(VisitOccurred::new(4, None)).await;

        assert_eq!(outcome, LocateOutcome::Located(VisitLocation::empty()));
    }

    #[tokio::test]
    async fn test_unusable_database_stores_nothing_and_dispatches() {
        let repo = repo_with_visit(visit(5, Some("80.12.34.56")));

        let mut updater = MockGeolocationDbUpdater::new();
        updater
            .expect_check_db_update()
            .times(1)
            .returning(|| Err(GeolocationDbUpdateError::Unusable(anyhow!("download failed"))));

        let locator = locator(
            repo,
            MockIpLocationResolver::new(),
            updater,
            dispatcher_expecting_located(5),
        );

        let outcome = locator.handle(VisitOccurred::new(5, None)).await;

        assert_eq!(outcome, LocateOutcome::NotLocated);
    }

    #[tokio::test]
    async fn test_stale_database_still_resolves() {
        let mut repo = repo_with_visit(visit(6, Some("80.12.34.56")));
        repo.expect_save_location()
            .withf(|_, location| *location == madrid())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut updater = MockGeolocationDbUpdater::new();
        updater.expect_check_db_update().times(1).returning(|| {
            Err(GeolocationDbUpdateError::StaleButUsable(anyhow!("download failed")))
        });

        let mut resolver = MockIpLocationResolver::new();
        resolver
            .expect_resolve_ip_location()
            .times(1)
            .returning(|_| Ok(madrid()));

        let locator = locator(repo, resolver, updater, dispatcher_expecting_located(6));

        let outcome = locator.handle(VisitOccurred::new(6, None)).await;

        assert_eq!(outcome, LocateOutcome::Located(madrid()));
    }

    #[tokio::test]
    async fn test_resolver_without_database_stores_nothing() {
        let repo = repo_with_visit(visit(7, Some("80.12.34.56")));

        let mut updater = MockGeolocationDbUpdater::new();
        updater.expect_check_db_update().times(1).returning(|| Ok(()));

        let mut resolver = MockIpLocationResolver::new();
        resolver
            .expect_resolve_ip_location()
            .times(1)
            .returning(|_| Err(IpLocationError::DatabaseUnavailable("no file".to_string())));

        let locator = locator(repo, resolver, updater, dispatcher_expecting_located(7));

        let outcome = locator.handle(VisitOccurred::new(7, None)).await;

        assert_eq!(outcome, LocateOutcome::NotLocated);
    }

    #[tokio::test]
    async fn test_store_failure_still_dispatches() {
        let mut repo = repo_with_visit(visit(8, None));
        repo.expect_save_location()
            .times(1)
            .returning(|_, _| Err(AppError::internal("db down", serde_json::json!({}))));

        let locator = locator(
            repo,
            MockIpLocationResolver::new(),
            MockGeolocationDbUpdater::new(),
            dispatcher_expecting_located(8),
        );

        let outcome = locator.handle(VisitOccurred::new(8, None)).await;

        assert_eq!(outcome, LocateOutcome::NotLocated);
    }

    #[tokio::test]
    async fn test_load_failure_still_dispatches() {
        let mut repo = MockVisitRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(|_| Err(AppError::internal("db down", serde_json::json!({}))));

        let locator = locator(
            repo,
            MockIpLocationResolver::new(),
            MockGeolocationDbUpdater::new(),
            dispatcher_expecting_located(9),
        );

        let outcome = locator.handle(VisitOccurred::new(9, None)).await;

        assert_eq!(outcome, LocateOutcome::NotLocated);
    }

    #[tokio::test]
    async fn test_locate_unlocated_visits_does_not_dispatch() {
        let mut repo = MockVisitRepository::new();
        repo.expect_find_unlocated()
            .withf(|limit| *limit == 50)
            .times(1)
            .returning(|_| Ok(vec![visit(1, None), visit(2, Some("80.12.34.56"))]));
        repo.expect_save_location().times(2).returning(|_, _| Ok(()));

        let mut updater = MockGeolocationDbUpdater::new();
        updater.expect_check_db_update().times(1).returning(|| Ok(()));

        let mut resolver = MockIpLocationResolver::new();
        resolver
            .expect_resolve_ip_location()
            .times(1)
            .returning(|_| Ok(madrid()));

        let locator = locator(repo, resolver, updater, MockEventDispatcher::new());

        let located = locator.locate_unlocated_visits(50).await.unwrap();

        assert_eq!(located, 2);
    }
}
