//! Resolution of a short URL's relations (domain and tags) from raw input.
//!
//! Entity construction and edits receive a resolver explicitly. When none is
//! given, [`SimpleShortUrlRelationResolver`] is used, which builds fresh,
//! unpersisted relations from the names alone.

use std::collections::BTreeSet;

use crate::domain::entities::{Domain, Tag};

#[cfg_attr(test, mockall::automock)]
pub trait ShortUrlRelationResolver: Send + Sync {
    /// Maps a raw authority to a domain. `None` means the default domain.
    fn resolve_domain<'a>(&self, authority: Option<&'a str>) -> Option<Domain>;

    /// Maps raw tag names to a set of unique tags.
    fn resolve_tags(&self, tags: &[String]) -> BTreeSet<Tag>;
}

/// Resolver that relies on set membership only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleShortUrlRelationResolver;

impl ShortUrlRelationResolver for SimpleShortUrlRelationResolver {
    fn resolve_domain(&self, authority: Option<&str>) -> Option<Domain> {
        authority
            .map(str::trim)
            .filter(|authority| !authority.is_empty())
            .map(Domain::new)
    }

    fn resolve_tags(&self, tags: &[String]) -> BTreeSet<Tag> {
        tags.iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(Tag::new)
            .collect()
    }
}
