//! Builds the hub updates published for a located visit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::entities::{ShortUrl, Visit, VisitLocation, VisitTarget};
use crate::infrastructure::hub::Update;

pub const DEFAULT_TOPIC_PREFIX: &str = "visits";

/// Topic names and payload shapes for visit notifications.
///
/// Topics:
/// - `{prefix}/new-visit` - every non-orphan visit
/// - `{prefix}/new-visit/{shortCode}` - visits of one short URL
/// - `{prefix}/new-orphan-visit` - orphan visits
#[derive(Debug, Clone)]
pub struct UpdatesGenerator {
    topic_prefix: String,
}

impl Default for UpdatesGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}

impl UpdatesGenerator {
    pub fn new(topic_prefix: impl Into<String>) -> Self {
        let topic_prefix: String = topic_prefix.into();
        Self {
            topic_prefix: topic_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Update for the global feed of non-orphan visits.
    pub fn new_visit_update(&self, visit: &Visit, short_url: &Value) -> Update {
        Update::new(
            format!("{}/new-visit", self.topic_prefix),
            to_payload(&VisitUpdatePayload::new(visit, Some(short_url))),
        )
    }

    /// Update for the subscribers of the visited short URL.
    pub fn new_short_url_visit_update(&self, visit: &Visit, short_url: &Value) -> Update {
        let short_code = visit.target.short_code().unwrap_or_default();

        Update::new(
            format!("{}/new-visit/{}", self.topic_prefix, short_code),
            to_payload(&VisitUpdatePayload::new(visit, Some(short_url))),
        )
    }

    pub fn new_orphan_visit_update(&self, visit: &Visit) -> Update {
        Update::new(
            format!("{}/new-orphan-visit", self.topic_prefix),
            to_payload(&VisitUpdatePayload::new(visit, None)),
        )
    }
}

/// Body of every visit update. Orphan updates carry no short URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VisitUpdatePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    short_url: Option<&'a Value>,
    visit: VisitPayload<'a>,
}

impl<'a> VisitUpdatePayload<'a> {
    fn new(visit: &'a Visit, short_url: Option<&'a Value>) -> Self {
        Self {
            short_url,
            visit: VisitPayload::from(visit),
        }
    }
}

/// Serialized short URL, as embedded in non-orphan updates.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrlPayload<'a> {
    pub short_code: &'a str,
    pub long_url: &'a str,
    pub date_created: DateTime<Utc>,
    pub domain: Option<&'a str>,
    pub title: Option<&'a str>,
    pub tags: Vec<&'a str>,
    pub meta: ShortUrlMetaPayload,
    pub visits_summary: VisitsSummaryPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrlMetaPayload {
    pub valid_since: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_visits: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VisitsSummaryPayload {
    pub total: i64,
}

impl<'a> From<&'a ShortUrl> for ShortUrlPayload<'a> {
    fn from(short_url: &'a ShortUrl) -> Self {
        Self {
            short_code: short_url.short_code(),
            long_url: short_url.long_url(),
            date_created: short_url.date_created(),
            domain: short_url.authority(),
            title: short_url.title(),
            tags: short_url.tags().iter().map(|tag| tag.name()).collect(),
            meta: ShortUrlMetaPayload {
                valid_since: short_url.valid_since(),
                valid_until: short_url.valid_until(),
                max_visits: short_url.max_visits(),
            },
            visits_summary: VisitsSummaryPayload {
                total: short_url.visits_count(),
            },
        }
    }
}

/// Short URL reference used when only the visit's target is known.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShortUrlReferencePayload<'a> {
    short_code: &'a str,
    domain: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitPayload<'a> {
    pub referer: &'a str,
    pub user_agent: &'a str,
    pub date: DateTime<Utc>,
    pub visit_location: Option<VisitLocationPayload<'a>>,
    #[serde(flatten)]
    pub orphan: Option<OrphanVisitPayload<'a>>,
}

/// Fields only orphan visits expose.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanVisitPayload<'a> {
    pub visited_url: Option<&'a str>,
    #[serde(rename = "type")]
    pub visit_type: &'static str,
}

impl<'a> From<&'a Visit> for VisitPayload<'a> {
    fn from(visit: &'a Visit) -> Self {
        let orphan = visit.is_orphan().then(|| OrphanVisitPayload {
            visited_url: visit.visited_url.as_deref(),
            visit_type: visit.target.as_str(),
        });

        Self {
            referer: &visit.referer,
            user_agent: &visit.user_agent,
            date: visit.visited_at,
            visit_location: visit.location.as_ref().map(VisitLocationPayload::from),
            orphan,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitLocationPayload<'a> {
    pub country_code: &'a str,
    pub country_name: &'a str,
    pub region_name: &'a str,
    pub city_name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: &'a str,
    pub is_empty: bool,
}

impl<'a> From<&'a VisitLocation> for VisitLocationPayload<'a> {
    fn from(location: &'a VisitLocation) -> Self {
        Self {
            country_code: &location.country_code,
            country_name: &location.country_name,
            region_name: &location.region_name,
            city_name: &location.city_name,
            latitude: location.latitude,
            longitude: location.longitude,
            timezone: &location.timezone,
            is_empty: location.is_empty(),
        }
    }
}

/// Serializes a short URL for notification payloads.
pub fn short_url_payload(short_url: &ShortUrl) -> Value {
    to_payload(&ShortUrlPayload::from(short_url))
}

/// Minimal short URL payload, used when only the visit's target is known.
pub fn short_url_reference_payload(visit: &Visit) -> Value {
    match &visit.target {
        VisitTarget::ShortUrl {
            short_code, domain, ..
        } => to_payload(&ShortUrlReferencePayload {
            short_code,
            domain: domain.as_deref(),
        }),
        _ => Value::Null,
    }
}

fn to_payload<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize notification payload");
        Value::Null
    })
}
