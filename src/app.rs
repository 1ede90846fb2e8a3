//! Pipeline assembly and runtime lifecycle.
//!
//! Connects PostgreSQL, the notification hub and the GeoLite2 database, then
//! starts the event bus worker and the optional locate sweep.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::application::services::{
    TrackingOptions, UpdatesGenerator, VisitLocator, VisitNotifier, VisitsStatsService,
    VisitsTracker, run_locate_sweep,
};
use crate::config::Config;
use crate::domain::visit_worker::{ChannelEventDispatcher, VisitListeners, run_visit_worker};
use crate::infrastructure::geolocation::{
    GeoLiteDatabase, GeoLiteDbDownloader, GeoLiteDbUpdater, GeoLiteResolver, HttpDbDownloader,
};
use crate::infrastructure::hub::{NotificationHub, NullHub, RedisHub};
use crate::infrastructure::persistence::{
    PgShortUrlRepository, PgTagRepository, PgVisitRepository,
};

pub type PgVisitsTracker = VisitsTracker<PgVisitRepository, ChannelEventDispatcher>;
pub type PgVisitsStatsService =
    VisitsStatsService<PgShortUrlRepository, PgTagRepository, PgVisitRepository>;

/// A running pipeline.
///
/// Services that record visits use [`VisitPipeline::tracker`]; read APIs use
/// [`VisitPipeline::stats`].
pub struct VisitPipeline {
    pub tracker: Arc<PgVisitsTracker>,
    pub stats: Arc<PgVisitsStatsService>,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
    sweep: Option<JoinHandle<()>>,
}

impl VisitPipeline {
    /// Connects every collaborator and starts the background tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable, migrations fail or the
    /// GeoLite2 downloader cannot be built.
    pub async fn start(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime))
            .connect(&config.database_url)
            .await
            .context("Failed to connect to database")?;
        tracing::info!("Connected to database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to migrate")?;

        let pool = Arc::new(pool);
        let visits = Arc::new(PgVisitRepository::new(pool.clone()));
        let short_urls = Arc::new(PgShortUrlRepository::new(pool.clone()));
        let tags = Arc::new(PgTagRepository::new(pool));

        let hub = connect_hub(config).await;

        let database = Arc::new(GeoLiteDatabase::new(config.geolite_db_path.clone()));
        if !database.file_exists() && config.geolite_download_url.is_none() {
            tracing::warn!(
                path = %database.path().display(),
                "GeoLite2 database not found and downloads are disabled; visits will not be located"
            );
        }
        let updater = Arc::new(GeoLiteDbUpdater::new(
            database.clone(),
            build_downloader(config)?,
            chrono::Duration::days(config.geolite_max_age_days),
        ));
        let resolver = Arc::new(GeoLiteResolver::new(database));

        let (dispatcher, queue) = ChannelEventDispatcher::channel(config.visit_queue_capacity);
        let dispatcher = Arc::new(dispatcher);

        let locator = Arc::new(VisitLocator::new(
            visits.clone(),
            resolver,
            updater,
            dispatcher.clone(),
        ));
        let notifier = Arc::new(VisitNotifier::new(
            visits.clone(),
            short_urls.clone(),
            hub,
            UpdatesGenerator::new(config.notification_topic_prefix.clone()),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(run_visit_worker(
            queue,
            VisitListeners::new(locator.clone(), notifier),
            config.visit_worker_concurrency,
            shutdown_rx.clone(),
        ));

        let sweep = config.is_sweep_enabled().then(|| {
            tracing::info!("Locate sweep started");
            tokio::spawn(run_locate_sweep(
                locator,
                Duration::from_secs(config.locate_sweep_interval_seconds),
                config.locate_sweep_batch_size,
                shutdown_rx,
            ))
        });

        let tracker = Arc::new(VisitsTracker::new(
            visits.clone(),
            dispatcher,
            TrackingOptions {
                anonymize_remote_addr: config.anonymize_remote_addr,
                track_orphan_visits: config.track_orphan_visits,
            },
        ));
        let stats = Arc::new(VisitsStatsService::new(short_urls, tags, visits));

        Ok(Self {
            tracker,
            stats,
            shutdown_tx,
            worker,
            sweep,
        })
    }

    /// Signals shutdown and waits for queued events to be handled.
    ///
    /// # Errors
    ///
    /// Returns an error if a background task panicked.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        self.worker.await.context("Visit worker panicked")?;
        if let Some(sweep) = self.sweep {
            sweep.await.context("Locate sweep panicked")?;
        }

        Ok(())
    }
}

async fn connect_hub(config: &Config) -> Arc<dyn NotificationHub> {
    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Notifications disabled (NullHub)");
        return Arc::new(NullHub::new());
    };

    match RedisHub::connect(redis_url).await {
        Ok(hub) => verified_hub(Arc::new(hub), "Redis").await,
        Err(e) => {
            tracing::warn!("Failed to connect to Redis: {}. Using NullHub.", e);
            Arc::new(NullHub::new())
        }
    }
}

/// Keeps `hub` if its backend answers the health check, otherwise falls back
/// to [`NullHub`].
async fn verified_hub(hub: Arc<dyn NotificationHub>, backend: &str) -> Arc<dyn NotificationHub> {
    if hub.health_check().await {
        tracing::info!(backend, "Notifications enabled");
        return hub;
    }

    tracing::warn!(backend, "Notification hub health check failed. Using NullHub.");
    Arc::new(NullHub::new())
}

fn build_downloader(config: &Config) -> Result<Option<Arc<dyn GeoLiteDbDownloader>>> {
    let Some(url) = &config.geolite_download_url else {
        return Ok(None);
    };

    let downloader = HttpDbDownloader::new(
        Url::parse(url).context("Invalid GEOLITE_DOWNLOAD_URL")?,
        Duration::from_secs(config.geolite_download_timeout),
        config.geolite_download_attempts,
    )?;

    Ok(Some(Arc::new(downloader)))
}

/// Runs the pipeline until Ctrl+C.
///
/// # Errors
///
/// Returns an error if startup fails or a background task panicked.
pub async fn run(config: Config) -> Result<()> {
    let pipeline = VisitPipeline::start(&config).await?;
    tracing::info!("Visit pipeline running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down visit pipeline");

    pipeline.shutdown().await
}
