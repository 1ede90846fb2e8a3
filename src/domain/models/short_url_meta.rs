//! Structured input for creating short URLs.

use chrono::{DateTime, Utc};

use crate::utils::code_generator::DEFAULT_SHORT_CODE_LENGTH;

/// Everything needed to build a new [`ShortUrl`](crate::domain::entities::ShortUrl).
#[derive(Debug, Clone, PartialEq)]
pub struct ShortUrlMeta {
    pub long_url: String,
    pub tags: Vec<String>,
    pub valid_since: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_visits: Option<i64>,
    /// User-chosen short code. A random one is generated when absent.
    pub custom_slug: Option<String>,
    pub short_code_length: usize,
    pub domain: Option<String>,
    pub author_api_key_id: Option<i64>,
    pub title: Option<String>,
    pub title_was_auto_resolved: bool,
}

impl Default for ShortUrlMeta {
    fn default() -> Self {
        Self {
            long_url: String::new(),
            tags: Vec::new(),
            valid_since: None,
            valid_until: None,
            max_visits: None,
            custom_slug: None,
            short_code_length: DEFAULT_SHORT_CODE_LENGTH,
            domain: None,
            author_api_key_id: None,
            title: None,
            title_was_auto_resolved: false,
        }
    }
}

impl ShortUrlMeta {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_long_url(long_url: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            ..Self::default()
        }
    }

    pub fn has_custom_slug(&self) -> bool {
        self.custom_slug.is_some()
    }
}

/// A short URL coming from another system during an import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedShortUrl {
    pub source: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub short_code: String,
    pub domain: Option<String>,
    pub tags: Vec<String>,
    pub title: Option<String>,
}
