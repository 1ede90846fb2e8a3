mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::NoopDispatcher;
use visit_pipeline::application::services::{TrackingOptions, VisitsStatsService, VisitsTracker};
use visit_pipeline::domain::entities::{ApiKey, AuthorizationScope, RoleDefinition};
use visit_pipeline::domain::models::{DateRange, ShortUrlIdentifier, VisitsParams};
use visit_pipeline::infrastructure::persistence::InMemoryStore;
use visit_pipeline::AppError;

type Service = VisitsStatsService<InMemoryStore, InMemoryStore, InMemoryStore>;

/// Two short URLs, five visits to them and two orphan visits.
async fn seeded() -> (Arc<InMemoryStore>, Service) {
    let store = Arc::new(InMemoryStore::new());
    let tracker = VisitsTracker::new(store.clone(), Arc::new(NoopDispatcher), TrackingOptions::default());

    let promo = common::create_short_url(&store, "promo", None, &["sale", "summer"]).await;
    let docs = common::create_short_url(&store, "docs", Some("docs.test"), &["sale"]).await;

    for _ in 0..3 {
        tracker.track(&promo, &common::visitor(Some("80.12.34.56"))).await.unwrap();
    }
    for _ in 0..2 {
        tracker.track(&docs, &common::visitor(None)).await.unwrap();
    }
    tracker.track_base_url_visit(&common::visitor(None)).await.unwrap();
    tracker.track_invalid_short_url_visit(&common::visitor(None)).await.unwrap();

    let service = VisitsStatsService::new(store.clone(), store.clone(), store.clone());
    (store, service)
}

#[tokio::test]
async fn test_overall_stats() {
    let (_, service) = seeded().await;

    let stats = service.visits_stats(None).await.unwrap();

    assert_eq!(stats.total, 5);
    assert_eq!(stats.orphan_total, 2);
}

#[tokio::test]
async fn test_overall_stats_in_domain_scope() {
    let (_, service) = seeded().await;
    // Domains get ids in creation order; "docs.test" is the first one.
    let scope = ApiKey::with_roles(1, vec![RoleDefinition::for_domain(1)]).scope();

    let stats = service.visits_stats(scope).await.unwrap();

    assert_eq!(stats.total, 2);
    assert_eq!(stats.orphan_total, 2);
}

#[tokio::test]
async fn test_visits_for_short_url_are_paginated_newest_first() {
    let (_, service) = seeded().await;
    let params = VisitsParams::new(DateRange::all(), 1, Some(2));

    let page = service
        .visits_for_short_url(&ShortUrlIdentifier::for_default_domain("promo"), &params, None)
        .await
        .unwrap();

    assert_eq!(page.total_items, 3);
    assert_eq!(page.pages_count(), 2);
    assert_eq!(page.items.len(), 2);
    assert!(page.items[0].id > page.items[1].id);

    let second = service
        .visits_for_short_url(
            &ShortUrlIdentifier::for_default_domain("promo"),
            &VisitsParams::new(DateRange::all(), 2, Some(2)),
            None,
        )
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert!(second.items[0].id < page.items[1].id);
}

#[tokio::test]
async fn test_short_url_on_other_domain_is_not_found() {
    let (_, service) = seeded().await;

    let result = service
        .visits_for_short_url(
            &ShortUrlIdentifier::for_default_domain("docs"),
            &VisitsParams::default(),
            None,
        )
        .await;

    assert!(matches!(
        result.unwrap_err(),
        AppError::ShortUrlNotFound { short_code, domain: None } if short_code == "docs"
    ));
}

#[tokio::test]
async fn test_short_url_outside_scope_is_not_found() {
    let (_, service) = seeded().await;
    let scope = AuthorizationScope {
        author_api_key_id: Some(99),
        domain_id: None,
    };

    let result = service
        .visits_for_short_url(
            &ShortUrlIdentifier::for_default_domain("promo"),
            &VisitsParams::default(),
            Some(scope),
        )
        .await;

    assert!(matches!(result.unwrap_err(), AppError::ShortUrlNotFound { .. }));
}

#[tokio::test]
async fn test_visits_for_tag() {
    let (_, service) = seeded().await;

    let sale = service
        .visits_for_tag("sale", &VisitsParams::default(), None)
        .await
        .unwrap();
    let summer = service
        .visits_for_tag("summer", &VisitsParams::default(), None)
        .await
        .unwrap();

    assert_eq!(sale.total_items, 5);
    assert_eq!(sale.items.len(), 5);
    assert_eq!(summer.total_items, 3);
}

#[tokio::test]
async fn test_unknown_tag_is_not_found() {
    let (_, service) = seeded().await;

    let result = service
        .visits_for_tag("winter", &VisitsParams::default(), None)
        .await;

    assert!(matches!(result.unwrap_err(), AppError::TagNotFound { tag } if tag == "winter"));
}

#[tokio::test]
async fn test_tag_outside_scope_is_not_found() {
    let (_, service) = seeded().await;
    let scope = ApiKey::with_roles(1, vec![RoleDefinition::for_domain(1)]).scope();

    let result = service
        .visits_for_tag("summer", &VisitsParams::default(), scope)
        .await;

    assert!(matches!(result.unwrap_err(), AppError::TagNotFound { .. }));
}

#[tokio::test]
async fn test_orphan_visits() {
    let (_, service) = seeded().await;

    let page = service.orphan_visits(&VisitsParams::default()).await.unwrap();

    assert_eq!(page.total_items, 2);
    assert!(page.items.iter().all(|visit| visit.is_orphan()));
}

#[tokio::test]
async fn test_orphan_visits_outside_date_range() {
    let (_, service) = seeded().await;
    let params = VisitsParams::new(DateRange::until(Utc::now() - Duration::days(1)), 1, None);

    let page = service.orphan_visits(&params).await.unwrap();

    assert!(page.is_empty());
    assert_eq!(page.total_items, 0);
}

#[tokio::test]
async fn test_empty_store_has_no_orphans_and_no_error() {
    let store = Arc::new(InMemoryStore::new());
    let service: Service = VisitsStatsService::new(store.clone(), store.clone(), store);

    let page = service.orphan_visits(&VisitsParams::default()).await.unwrap();

    assert!(page.is_empty());
    assert_eq!(page.pages_count(), 0);
}
