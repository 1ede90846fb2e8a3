//! Visit entity: one recorded hit, successful or not.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::entities::{ShortUrl, VisitLocation};
use crate::domain::models::Visitor;
use crate::error::AppError;
use crate::utils::ip_address::anonymize_remote_addr;

/// What a visit hit.
///
/// Every variant but [`VisitTarget::ShortUrl`] is an orphan visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitTarget {
    ShortUrl {
        short_url_id: i64,
        short_code: String,
        domain: Option<String>,
    },
    /// The service's base URL, without a short code.
    BasePath,
    /// A short code that matched nothing (or a disabled short URL).
    InvalidShortUrl,
    /// Any other path that produced a not-found response.
    RegularNotFound,
}

impl VisitTarget {
    pub fn is_orphan(&self) -> bool {
        !matches!(self, VisitTarget::ShortUrl { .. })
    }

    /// Stable name used in storage and in notification payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitTarget::ShortUrl { .. } => "valid_short_url",
            VisitTarget::BasePath => "base_url",
            VisitTarget::InvalidShortUrl => "invalid_short_url",
            VisitTarget::RegularNotFound => "regular_404",
        }
    }

    pub fn short_code(&self) -> Option<&str> {
        match self {
            VisitTarget::ShortUrl { short_code, .. } => Some(short_code),
            _ => None,
        }
    }
}

/// A persisted visit.
///
/// `location` is `None` until the location stage processes the visit.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub id: i64,
    pub referer: String,
    pub user_agent: String,
    pub remote_addr: Option<String>,
    pub visited_url: Option<String>,
    pub visited_at: DateTime<Utc>,
    pub target: VisitTarget,
    pub location: Option<VisitLocation>,
}

impl Visit {
    pub fn is_orphan(&self) -> bool {
        self.target.is_orphan()
    }

    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }
}

/// Input data for recording a visit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVisit {
    pub referer: String,
    pub user_agent: String,
    pub remote_addr: Option<String>,
    pub visited_url: Option<String>,
    pub visited_at: DateTime<Utc>,
    pub target: VisitTarget,
}

impl NewVisit {
    /// A visit to a persisted short URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the short URL has no id yet.
    pub fn for_valid_short_url(
        short_url: &ShortUrl,
        visitor: &Visitor,
        anonymize: bool,
    ) -> Result<Self, AppError> {
        let short_url_id = short_url
            .id()
            .ok_or_else(|| {
                AppError::internal(
                    "Cannot track a visit for an unsaved short URL",
                    json!({ "short_code": short_url.short_code() }),
                )
            })?;

        let target = VisitTarget::ShortUrl {
            short_url_id,
            short_code: short_url.short_code().to_string(),
            domain: short_url.authority().map(str::to_string),
        };

        Ok(Self::from_visitor(visitor, anonymize, target))
    }

    pub fn for_base_path(visitor: &Visitor, anonymize: bool) -> Self {
        Self::from_visitor(visitor, anonymize, VisitTarget::BasePath)
    }

    pub fn for_invalid_short_url(visitor: &Visitor, anonymize: bool) -> Self {
        Self::from_visitor(visitor, anonymize, VisitTarget::InvalidShortUrl)
    }

    pub fn for_regular_not_found(visitor: &Visitor, anonymize: bool) -> Self {
        Self::from_visitor(visitor, anonymize, VisitTarget::RegularNotFound)
    }

    fn from_visitor(visitor: &Visitor, anonymize: bool, target: VisitTarget) -> Self {
        let remote_addr = if anonymize {
            anonymize_remote_addr(visitor.remote_address.as_deref())
        } else {
            visitor.remote_address.clone()
        };

        Self {
            referer: visitor.referer.clone().unwrap_or_default(),
            user_agent: visitor.user_agent.clone().unwrap_or_default(),
            remote_addr,
            visited_url: visitor.visited_url.clone(),
            visited_at: Utc::now(),
            target,
        }
    }

    /// Materializes the visit once storage assigned an id.
    pub fn into_visit(self, id: i64) -> Visit {
        Visit {
            id,
            referer: self.referer,
            user_agent: self.user_agent,
            remote_addr: self.remote_addr,
            visited_url: self.visited_url,
            visited_at: self.visited_at,
            target: self.target,
            location: None,
        }
    }
}
