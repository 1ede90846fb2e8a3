//! Keeps the local GeoLite2 database present and fresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::sync::Mutex;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use url::Url;

use super::database::GeoLiteDatabase;
use super::service::{GeolocationDbUpdateError, GeolocationDbUpdater};

/// Source of fresh database files.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoLiteDbDownloader: Send + Sync {
    /// Returns the raw bytes of an `.mmdb` file.
    async fn download(&self) -> Result<Vec<u8>>;
}

/// Downloads the database over HTTP, retrying with exponential backoff.
pub struct HttpDbDownloader {
    client: Client,
    url: Url,
    attempts: usize,
}

impl HttpDbDownloader {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration, attempts: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("visit-pipeline/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for GeoLite2 downloads")?;

        Ok(Self {
            client,
            url,
            attempts: attempts.max(1),
        })
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .context("GeoLite2 download request failed")?
            .error_for_status()
            .context("GeoLite2 download rejected")?;

        let bytes = response
            .bytes()
            .await
            .context("failed to read GeoLite2 download body")?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl GeoLiteDbDownloader for HttpDbDownloader {
    async fn download(&self) -> Result<Vec<u8>> {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.attempts - 1);

        Retry::start(strategy, || async {
            self.fetch().await.inspect_err(|e| {
                tracing::debug!(error = %e, "GeoLite2 download attempt failed");
            })
        })
        .await
    }
}

/// Why the database has to be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshReason {
    Missing,
    Stale,
}

fn refresh_reason(
    build_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_age: chrono::Duration,
) -> Option<RefreshReason> {
    match build_time {
        None => Some(RefreshReason::Missing),
        Some(built) if now - built > max_age => Some(RefreshReason::Stale),
        Some(_) => None,
    }
}

/// Updater serializing refreshes behind an async mutex.
///
/// - missing (or unreadable) file: download, failure is
///   [`GeolocationDbUpdateError::Unusable`]
/// - file older than `max_age`: download, failure is
///   [`GeolocationDbUpdateError::StaleButUsable`]
///
/// After a failed download no new attempt is made for `retry_cooldown`.
pub struct GeoLiteDbUpdater {
    database: Arc<GeoLiteDatabase>,
    downloader: Option<Arc<dyn GeoLiteDbDownloader>>,
    max_age: chrono::Duration,
    retry_cooldown: Duration,
    last_failure: Mutex<Option<Instant>>,
}

impl GeoLiteDbUpdater {
    /// `downloader: None` never downloads; a missing database stays unusable.
    pub fn new(
        database: Arc<GeoLiteDatabase>,
        downloader: Option<Arc<dyn GeoLiteDbDownloader>>,
        max_age: chrono::Duration,
    ) -> Self {
        Self {
            database,
            downloader,
            max_age,
            retry_cooldown: Duration::from_secs(300),
            last_failure: Mutex::new(None),
        }
    }

    pub fn with_retry_cooldown(mut self, retry_cooldown: Duration) -> Self {
        self.retry_cooldown = retry_cooldown;
        self
    }

    async fn download_and_replace(&self) -> Result<()> {
        let downloader = self
            .downloader
            .as_ref()
            .ok_or_else(|| anyhow!("no GeoLite2 download URL configured"))?;

        let bytes = downloader.download().await?;
        self.database.replace_with(bytes).await
    }
}

#[async_trait]
impl GeolocationDbUpdater for GeoLiteDbUpdater {
    async fn check_db_update(&self) -> Result<(), GeolocationDbUpdateError> {
        let mut last_failure = self.last_failure.lock().await;

        let build_time = self.database.build_time().await;
        let Some(reason) = refresh_reason(build_time, Utc::now(), self.max_age) else {
            return Ok(());
        };

        let outcome = match *last_failure {
            Some(at) if at.elapsed() < self.retry_cooldown => {
                Err(anyhow!("GeoLite2 download failed recently, not retrying yet"))
            }
            _ => {
                tracing::info!(
                    path = %self.database.path().display(),
                    reason = ?reason,
                    "Downloading GeoLite2 database"
                );
                self.download_and_replace().await
            }
        };

        match outcome {
            Ok(()) => {
                *last_failure = None;
                Ok(())
            }
            Err(e) => {
                if (*last_failure).is_none_or(|at| at.elapsed() >= self.retry_cooldown) {
                    *last_failure = Some(Instant::now());
                }
                Err(match reason {
                    RefreshReason::Missing => GeolocationDbUpdateError::Unusable(e),
                    RefreshReason::Stale => GeolocationDbUpdateError::StaleButUsable(e),
                })
            }
        }
    }
}
