#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use visit_pipeline::application::services::{
    TrackingOptions, UpdatesGenerator, VisitLocator, VisitNotifier, VisitsTracker,
};
use visit_pipeline::domain::entities::{ShortUrl, VisitLocation};
use visit_pipeline::domain::models::{ShortUrlMeta, Visitor};
use visit_pipeline::domain::repositories::ShortUrlRepository;
use visit_pipeline::domain::visit_event::{EventDispatcher, VisitEvent};
use visit_pipeline::domain::visit_worker::{ChannelEventDispatcher, VisitListeners, run_visit_worker};
use visit_pipeline::infrastructure::geolocation::{
    GeolocationDbUpdateError, GeolocationDbUpdater, IpLocationError, IpLocationResolver,
};
use visit_pipeline::infrastructure::hub::{HubError, HubResult, NotificationHub, Update};
use visit_pipeline::infrastructure::persistence::InMemoryStore;

pub fn madrid() -> VisitLocation {
    VisitLocation {
        country_code: "ES".to_string(),
        country_name: "Spain".to_string(),
        region_name: "Madrid".to_string(),
        city_name: "Madrid".to_string(),
        latitude: 40.4165,
        longitude: -3.7026,
        timezone: "Europe/Madrid".to_string(),
    }
}

pub fn visitor(remote_address: Option<&str>) -> Visitor {
    Visitor::new(
        Some("Mozilla/5.0 (X11; Linux x86_64)"),
        Some("https://referer.test/page"),
        remote_address.map(str::to_string),
        Some("https://s.test/some/path"),
    )
}

pub async fn create_short_url(
    store: &InMemoryStore,
    slug: &str,
    domain: Option<&str>,
    tags: &[&str],
) -> ShortUrl {
    let meta = ShortUrlMeta {
        custom_slug: Some(slug.to_string()),
        domain: domain.map(str::to_string),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        ..ShortUrlMeta::with_long_url(format!("https://example.com/{slug}"))
    };

    store.save(ShortUrl::from_meta(meta, None)).await.unwrap()
}

/// Hub that records every update it is given.
#[derive(Default)]
pub struct RecordingHub {
    updates: Mutex<Vec<Update>>,
    fail: bool,
}

impl RecordingHub {
    pub fn failing() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .updates
            .lock()
            .unwrap()
            .iter()
            .map(|update| update.topic.clone())
            .collect();
        topics.sort();
        topics
    }

    pub fn updates(&self) -> Vec<Update> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationHub for RecordingHub {
    async fn publish(&self, update: &Update) -> HubResult<()> {
        self.updates.lock().unwrap().push(update.clone());

        if self.fail {
            return Err(HubError::PublishError("hub unavailable".to_string()));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.fail
    }
}

/// Resolver returning one location for every address, recording the lookups.
#[derive(Default)]
pub struct FixedResolver {
    pub lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl IpLocationResolver for FixedResolver {
    async fn resolve_ip_location(&self, address: &str) -> Result<VisitLocation, IpLocationError> {
        self.lookups.lock().unwrap().push(address.to_string());

        if address.parse::<std::net::IpAddr>().is_err() {
            return Err(IpLocationError::MalformedAddress {
                address: address.to_string(),
                reason: "invalid IP address syntax".to_string(),
            });
        }
        Ok(madrid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbState {
    Fresh,
    Stale,
    Unusable,
}

/// Updater whose outcome can be switched during a test.
pub struct SwitchableUpdater {
    state: Mutex<DbState>,
}

impl SwitchableUpdater {
    pub fn new(state: DbState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set(&self, state: DbState) {
        *self.state.lock().unwrap() = state;
    }
}

#[async_trait]
impl GeolocationDbUpdater for SwitchableUpdater {
    async fn check_db_update(&self) -> Result<(), GeolocationDbUpdateError> {
        let state = *self.state.lock().unwrap();
        match state {
            DbState::Fresh => Ok(()),
            DbState::Stale => Err(GeolocationDbUpdateError::StaleButUsable(anyhow!(
                "download failed"
            ))),
            DbState::Unusable => Err(GeolocationDbUpdateError::Unusable(anyhow!(
                "download failed"
            ))),
        }
    }
}

/// Dispatcher that drops every event.
pub struct NoopDispatcher;

#[async_trait]
impl EventDispatcher for NoopDispatcher {
    async fn dispatch(&self, _event: VisitEvent) {}
}

pub type TestLocator =
    VisitLocator<InMemoryStore, FixedResolver, SwitchableUpdater, ChannelEventDispatcher>;

/// The whole pipeline over the in-memory store.
pub struct Pipeline {
    pub store: Arc<InMemoryStore>,
    pub hub: Arc<RecordingHub>,
    pub resolver: Arc<FixedResolver>,
    pub updater: Arc<SwitchableUpdater>,
    pub tracker: VisitsTracker<InMemoryStore, ChannelEventDispatcher>,
    pub locator: Arc<TestLocator>,
    shutdown_tx: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub fn start(db_state: DbState, hub: RecordingHub, options: TrackingOptions) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let hub = Arc::new(hub);
        let resolver = Arc::new(FixedResolver::default());
        let updater = Arc::new(SwitchableUpdater::new(db_state));

        let (dispatcher, queue) = ChannelEventDispatcher::channel(100);
        let dispatcher = Arc::new(dispatcher);

        let locator = Arc::new(VisitLocator::new(
            store.clone(),
            resolver.clone(),
            updater.clone(),
            dispatcher.clone(),
        ));
        let notifier = Arc::new(VisitNotifier::new(
            store.clone(),
            store.clone(),
            hub.clone(),
            UpdatesGenerator::default(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_visit_worker(
            queue,
            VisitListeners::new(locator.clone(), notifier),
            2,
            shutdown_rx,
        ));

        let tracker = VisitsTracker::new(store.clone(), dispatcher, options);

        Self {
            store,
            hub,
            resolver,
            updater,
            tracker,
            locator,
            shutdown_tx,
            worker: Some(worker),
        }
    }

    /// Stops the worker once every queued event was handled.
    pub async fn drain(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(worker) = self.worker.take() {
            worker.await.unwrap();
        }
    }
}
