//! Notification stage of the visit pipeline.
//!
//! Consumes [`VisitLocated`] and fans the visit out to the notification hub.
//! Publishing is best-effort: failures are logged at debug level and never
//! reach the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::updates_generator::{UpdatesGenerator, short_url_payload, short_url_reference_payload};
use crate::domain::entities::{Visit, VisitTarget};
use crate::domain::models::ShortUrlIdentifier;
use crate::domain::repositories::{ShortUrlRepository, VisitRepository};
use crate::domain::visit_event::{VisitLocated, VisitLocatedListener};
use crate::infrastructure::hub::{NotificationHub, Update};

/// The notification stage.
pub struct VisitNotifier<V: VisitRepository, S: ShortUrlRepository> {
    visits: Arc<V>,
    short_urls: Arc<S>,
    hub: Arc<dyn NotificationHub>,
    generator: UpdatesGenerator,
}

impl<V: VisitRepository, S: ShortUrlRepository> VisitNotifier<V, S> {
    pub fn new(
        visits: Arc<V>,
        short_urls: Arc<S>,
        hub: Arc<dyn NotificationHub>,
        generator: UpdatesGenerator,
    ) -> Self {
        Self {
            visits,
            short_urls,
            hub,
            generator,
        }
    }

    /// Publishes the updates for the located visit.
    ///
    /// Orphan visits produce one update; other visits produce the short URL
    /// specific update followed by the global one. Every update is attempted
    /// even when an earlier one failed.
    ///
    /// Returns how many updates the hub accepted.
    pub async fn handle(&self, event: VisitLocated) -> usize {
        let visit_id = event.visit_id;

        let visit = match self.visits.find_by_id(visit_id).await {
            Ok(Some(visit)) => visit,
            Ok(None) => {
                tracing::warn!(
                    visit_id,
                    "Tried to notify hub for visit, but it does not exist"
                );
                return 0;
            }
            Err(e) => {
                tracing::error!(visit_id, error = %e, "Failed to load visit to notify");
                return 0;
            }
        };

        let updates = self.updates_for(&visit).await;
        let mut delivered = 0;

        for update in &updates {
            match self.hub.publish(update).await {
                Ok(()) => {
                    delivered += 1;
                    metrics::counter!("visit_notifications_total", "result" => "published")
                        .increment(1);
                }
                Err(e) => {
                    tracing::debug!(
                        visit_id,
                        topic = %update.topic,
                        error = %e,
                        "Error while trying to notify hub with new visit"
                    );
                    metrics::counter!("visit_notifications_total", "result" => "failed")
                        .increment(1);
                }
            }
        }

        delivered
    }

    async fn updates_for(&self, visit: &Visit) -> Vec<Update> {
        if visit.is_orphan() {
            return vec![self.generator.new_orphan_visit_update(visit)];
        }

        let short_url = self.short_url_for(visit).await;

        vec![
            self.generator.new_short_url_visit_update(visit, &short_url),
            self.generator.new_visit_update(visit, &short_url),
        ]
    }

    async fn short_url_for(&self, visit: &Visit) -> Value {
        let VisitTarget::ShortUrl {
            short_code, domain, ..
        } = &visit.target
        else {
            return Value::Null;
        };

        let identifier = ShortUrlIdentifier::new(short_code.clone(), domain.clone());
        match self.short_urls.find_one(&identifier, None).await {
            Ok(Some(short_url)) => short_url_payload(&short_url),
            Ok(None) => short_url_reference_payload(visit),
            Err(e) => {
                tracing::debug!(
                    visit_id = visit.id,
                    error = %e,
                    "Failed to load short URL for notification payload"
                );
                short_url_reference_payload(visit)
            }
        }
    }
}

#[async_trait]
impl<V: VisitRepository, S: ShortUrlRepository> VisitLocatedListener for VisitNotifier<V, S> {
    async fn on_visit_located(&self, event: VisitLocated) {
        self.handle(event).await;
    }
}
