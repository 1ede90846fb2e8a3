//! Address resolution against a MaxMind City database.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use maxminddb::geoip2;

use super::database::GeoLiteDatabase;
use super::service::{IpLocationError, IpLocationResolver};
use crate::domain::entities::VisitLocation;

/// Resolver reading whichever database [`GeoLiteDatabase`] currently holds.
pub struct GeoLiteResolver {
    database: Arc<GeoLiteDatabase>,
}

impl GeoLiteResolver {
    pub fn new(database: Arc<GeoLiteDatabase>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl IpLocationResolver for GeoLiteResolver {
    async fn resolve_ip_location(&self, address: &str) -> Result<VisitLocation, IpLocationError> {
        let ip: IpAddr = address
            .trim()
            .parse()
            .map_err(|e: std::net::AddrParseError| IpLocationError::MalformedAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let reader = self.database.reader().await.ok_or_else(|| {
            IpLocationError::DatabaseUnavailable(format!(
                "no database at {}",
                self.database.path().display()
            ))
        })?;

        let result = reader
            .lookup(ip)
            .map_err(|e| IpLocationError::DatabaseUnavailable(e.to_string()))?;

        match result.decode::<geoip2::City>() {
            Ok(Some(city)) => Ok(location_from_city(&city)),
            Ok(None) => Ok(VisitLocation::empty()),
            Err(e) => {
                tracing::debug!(address, error = %e, "Failed to decode GeoLite2 record");
                Ok(VisitLocation::empty())
            }
        }
    }
}

fn location_from_city(city: &geoip2::City) -> VisitLocation {
    let text = |value: Option<&str>| value.unwrap_or_default().to_string();

    VisitLocation {
        country_code: text(city.country.iso_code),
        country_name: text(city.country.names.english),
        region_name: text(
            city.subdivisions
                .first()
                .and_then(|subdivision| subdivision.names.english),
        ),
        city_name: text(city.city.names.english),
        latitude: city.location.latitude.unwrap_or_default(),
        longitude: city.location.longitude.unwrap_or_default(),
        timezone: text(city.location.time_zone),
    }
}
