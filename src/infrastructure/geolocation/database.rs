//! Shared handle to the local GeoLite2 database file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use maxminddb::Reader;
use tokio::sync::RwLock;

pub type GeoLiteReader = Reader<Vec<u8>>;

/// The database file plus the reader currently serving lookups.
///
/// Lookups clone the inner `Arc`, so a replacement never disturbs a lookup
/// already running. Replacements are written next to the target file and
/// renamed into place only after they open as a valid database.
pub struct GeoLiteDatabase {
    path: PathBuf,
    reader: RwLock<Option<Arc<GeoLiteReader>>>,
}

impl GeoLiteDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_exists(&self) -> bool {
        self.path.is_file()
    }

    /// Returns the loaded reader, loading the file on first use.
    ///
    /// `None` when the file is missing or cannot be opened.
    pub async fn reader(&self) -> Option<Arc<GeoLiteReader>> {
        if let Some(reader) = self.reader.read().await.as_ref() {
            return Some(Arc::clone(reader));
        }
        if !self.file_exists() {
            return None;
        }

        match self.load().await {
            Ok(reader) => Some(reader),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to open GeoLite2 database");
                None
            }
        }
    }

    /// (Re)loads the file from disk and makes it the active reader.
    pub async fn load(&self) -> Result<Arc<GeoLiteReader>> {
        let reader = Arc::new(open(self.path.clone()).await?);
        *self.reader.write().await = Some(Arc::clone(&reader));

        tracing::info!(path = %self.path.display(), "GeoLite2 database loaded");
        Ok(reader)
    }

    /// Build time of the active database.
    pub async fn build_time(&self) -> Option<DateTime<Utc>> {
        let reader = self.reader().await?;
        let epoch = i64::try_from(reader.metadata.build_epoch).ok()?;
        DateTime::from_timestamp(epoch, 0)
    }

    /// Replaces the database file with `bytes` and swaps the active reader.
    ///
    /// # Errors
    ///
    /// Fails without touching the current file if `bytes` is not a valid
    /// database or cannot be written.
    pub async fn replace_with(&self, bytes: Vec<u8>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        let reader = match open(tmp_path.clone()).await {
            Ok(reader) => reader,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e.context("Downloaded file is not a valid GeoLite2 database"));
            }
        };

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to move database into {}", self.path.display()))?;
        *self.reader.write().await = Some(Arc::new(reader));

        tracing::info!(path = %self.path.display(), "GeoLite2 database replaced");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "GeoLite2-City.mmdb".into());
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

async fn open(path: PathBuf) -> Result<GeoLiteReader> {
    tokio::task::spawn_blocking(move || {
        Reader::open_readfile(&path)
            .with_context(|| format!("Failed to open GeoLite2 database at {}", path.display()))
    })
    .await?
}
