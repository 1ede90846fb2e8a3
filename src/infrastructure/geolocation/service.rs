//! Geolocation boundary traits and error types.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::VisitLocation;

/// Failures when resolving an address to a location.
#[derive(Debug, Error)]
pub enum IpLocationError {
    /// The address could not be parsed.
    #[error("Provided address \"{address}\" is not a valid IP address: {reason}")]
    MalformedAddress { address: String, reason: String },

    /// No database is available to resolve against.
    #[error("Geolocation database unavailable: {0}")]
    DatabaseUnavailable(String),
}

/// Failures when making sure the geolocation database is present and current.
///
/// Both variants carry the underlying cause.
#[derive(Debug, Error)]
pub enum GeolocationDbUpdateError {
    /// The refresh failed but an older copy is still there to use.
    #[error("GeoLite2 database refresh failed, using the existing copy")]
    StaleButUsable(#[source] anyhow::Error),

    /// There is no copy to use at all.
    #[error("GeoLite2 database is not available")]
    Unusable(#[source] anyhow::Error),
}

impl GeolocationDbUpdateError {
    pub fn is_usable(&self) -> bool {
        matches!(self, GeolocationDbUpdateError::StaleButUsable(_))
    }
}

/// Resolves network addresses to locations.
///
/// An address that is valid but unknown to the database resolves to
/// [`VisitLocation::empty`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpLocationResolver: Send + Sync {
    /// # Errors
    ///
    /// - [`IpLocationError::MalformedAddress`] for unparsable input
    /// - [`IpLocationError::DatabaseUnavailable`] when no database is loaded
    async fn resolve_ip_location(&self, address: &str) -> Result<VisitLocation, IpLocationError>;
}

/// Makes sure the geolocation database is present and fresh before lookups.
///
/// Implementations own the serialization of concurrent refreshes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeolocationDbUpdater: Send + Sync {
    /// # Errors
    ///
    /// - [`GeolocationDbUpdateError::StaleButUsable`] when a refresh failed but
    ///   an older copy is loaded
    /// - [`GeolocationDbUpdateError::Unusable`] when no copy is available
    async fn check_db_update(&self) -> Result<(), GeolocationDbUpdateError>;
}
