//! Short URL entity and the rules deciding whether it can currently be visited.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::entities::{Domain, Tag};
use crate::domain::models::{EditField, ImportedShortUrl, ShortUrlEdit, ShortUrlMeta};
use crate::domain::relation_resolver::{ShortUrlRelationResolver, SimpleShortUrlRelationResolver};
use crate::utils::code_generator::generate_random_short_code;

/// Reasons a short code cannot be replaced by a freshly generated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShortCodeCannotBeRegenerated {
    #[error("The short code cannot be regenerated on short URLs where a custom slug was provided")]
    CustomSlug,
    #[error("The short code can be regenerated only on new short URLs which have not been persisted yet")]
    AlreadyPersisted,
}

/// A short URL mapping a short code (unique per domain) to a long URL.
///
/// `id` is `None` until the short URL is persisted. `visits_count` is loaded
/// from storage and used by [`is_enabled_at`](Self::is_enabled_at).
#[derive(Debug, Clone, PartialEq)]
pub struct ShortUrl {
    pub(crate) id: Option<i64>,
    pub(crate) long_url: String,
    pub(crate) short_code: String,
    pub(crate) date_created: DateTime<Utc>,
    pub(crate) domain: Option<Domain>,
    pub(crate) tags: BTreeSet<Tag>,
    pub(crate) valid_since: Option<DateTime<Utc>>,
    pub(crate) valid_until: Option<DateTime<Utc>>,
    pub(crate) max_visits: Option<i64>,
    pub(crate) visits_count: i64,
    pub(crate) custom_slug_was_provided: bool,
    pub(crate) short_code_length: usize,
    pub(crate) import_source: Option<String>,
    pub(crate) import_original_short_code: Option<String>,
    pub(crate) author_api_key_id: Option<i64>,
    pub(crate) title: Option<String>,
    pub(crate) title_was_auto_resolved: bool,
}

impl ShortUrl {
    pub fn create_empty() -> Self {
        Self::from_meta(ShortUrlMeta::empty(), None)
    }

    pub fn with_long_url(long_url: impl Into<String>) -> Self {
        Self::from_meta(ShortUrlMeta::with_long_url(long_url), None)
    }

    /// Builds a new, unpersisted short URL.
    ///
    /// Without a resolver, relations are resolved with
    /// [`SimpleShortUrlRelationResolver`].
    pub fn from_meta(meta: ShortUrlMeta, resolver: Option<&dyn ShortUrlRelationResolver>) -> Self {
        let resolver = resolver.unwrap_or(&SimpleShortUrlRelationResolver);
        let custom_slug_was_provided = meta.has_custom_slug();
        let short_code = meta
            .custom_slug
            .unwrap_or_else(|| generate_random_short_code(meta.short_code_length));

        Self {
            id: None,
            long_url: meta.long_url,
            short_code,
            date_created: Utc::now(),
            domain: resolver.resolve_domain(meta.domain.as_deref()),
            tags: resolver.resolve_tags(&meta.tags),
            valid_since: meta.valid_since,
            valid_until: meta.valid_until,
            max_visits: meta.max_visits,
            visits_count: 0,
            custom_slug_was_provided,
            short_code_length: meta.short_code_length,
            import_source: None,
            import_original_short_code: None,
            author_api_key_id: meta.author_api_key_id,
            title: meta.title,
            title_was_auto_resolved: meta.title_was_auto_resolved,
        }
    }

    /// Builds a short URL from a record imported from another system.
    ///
    /// The original short code is kept only when `import_short_code` is set;
    /// otherwise a random one is generated.
    pub fn from_import(
        imported: ImportedShortUrl,
        import_short_code: bool,
        resolver: Option<&dyn ShortUrlRelationResolver>,
    ) -> Self {
        let meta = ShortUrlMeta {
            long_url: imported.long_url,
            domain: imported.domain,
            tags: imported.tags,
            title: imported.title,
            custom_slug: import_short_code.then(|| imported.short_code.clone()),
            ..ShortUrlMeta::default()
        };

        let mut short_url = Self::from_meta(meta, resolver);
        short_url.import_source = Some(imported.source);
        short_url.import_original_short_code = Some(imported.short_code);
        short_url.date_created = imported.created_at;
        short_url
    }

    /// Applies every field the edit marks as provided.
    ///
    /// A provided title that was auto-resolved does not replace a title the
    /// user supplied.
    pub fn update(&mut self, edit: ShortUrlEdit, resolver: Option<&dyn ShortUrlRelationResolver>) {
        if let EditField::Provided(valid_since) = edit.valid_since {
            self.valid_since = valid_since;
        }
        if let EditField::Provided(valid_until) = edit.valid_until {
            self.valid_until = valid_until;
        }
        if let EditField::Provided(max_visits) = edit.max_visits {
            self.max_visits = max_visits;
        }
        if let EditField::Provided(long_url) = edit.long_url {
            self.long_url = long_url;
        }
        if let EditField::Provided(tags) = edit.tags {
            let resolver = resolver.unwrap_or(&SimpleShortUrlRelationResolver);
            self.tags = resolver.resolve_tags(&tags);
        }
        if let EditField::Provided(title) = edit.title {
            let has_user_title = self.title.is_some() && !self.title_was_auto_resolved;
            if !(edit.title_was_auto_resolved && has_user_title) {
                self.title = title;
                self.title_was_auto_resolved = edit.title_was_auto_resolved;
            }
        }
    }

    /// Replaces the short code with a new random one.
    ///
    /// # Errors
    ///
    /// - [`ShortCodeCannotBeRegenerated::CustomSlug`] when the code was chosen
    ///   by the user (imported codes excepted)
    /// - [`ShortCodeCannotBeRegenerated::AlreadyPersisted`] once an id is assigned
    pub fn regenerate_short_code(&mut self) -> Result<(), ShortCodeCannotBeRegenerated> {
        if self.custom_slug_was_provided && self.import_source.is_none() {
            return Err(ShortCodeCannotBeRegenerated::CustomSlug);
        }
        if self.id.is_some() {
            return Err(ShortCodeCannotBeRegenerated::AlreadyPersisted);
        }

        self.short_code = generate_random_short_code(self.short_code_length);
        Ok(())
    }

    /// Whether the short URL accepts visits at `now`.
    ///
    /// Disabled when the visit cap is reached, before `valid_since`, or after
    /// `valid_until`. Checked in that order.
    pub fn is_enabled_at(&self, now: DateTime<Utc>) -> bool {
        if self
            .max_visits
            .is_some_and(|max_visits| self.visits_count >= max_visits)
        {
            return false;
        }
        if self.valid_since.is_some_and(|since| now < since) {
            return false;
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return false;
        }

        true
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled_at(Utc::now())
    }

    /// Returns a copy carrying the given stored visit count.
    pub fn with_visits_count(mut self, visits_count: i64) -> Self {
        self.visits_count = visits_count;
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn long_url(&self) -> &str {
        &self.long_url
    }

    pub fn short_code(&self) -> &str {
        &self.short_code
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn domain(&self) -> Option<&Domain> {
        self.domain.as_ref()
    }

    /// Authority of the domain, `None` for the default domain.
    pub fn authority(&self) -> Option<&str> {
        self.domain.as_ref().map(|domain| domain.authority.as_str())
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    pub fn valid_since(&self) -> Option<DateTime<Utc>> {
        self.valid_since
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    pub fn max_visits(&self) -> Option<i64> {
        self.max_visits
    }

    pub fn visits_count(&self) -> i64 {
        self.visits_count
    }

    pub fn custom_slug_was_provided(&self) -> bool {
        self.custom_slug_was_provided
    }

    pub fn import_source(&self) -> Option<&str> {
        self.import_source.as_deref()
    }

    pub fn import_original_short_code(&self) -> Option<&str> {
        self.import_original_short_code.as_deref()
    }

    pub fn author_api_key_id(&self) -> Option<i64> {
        self.author_api_key_id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn title_was_auto_resolved(&self) -> bool {
        self.title_was_auto_resolved
    }
}
