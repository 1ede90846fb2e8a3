//! IP geolocation backed by MaxMind GeoLite2.
//!
//! - [`IpLocationResolver`] / [`GeoLiteResolver`] - address to location
//! - [`GeolocationDbUpdater`] / [`GeoLiteDbUpdater`] - database presence and freshness
//! - [`GeoLiteDatabase`] - the shared, swappable database handle both use

mod database;
mod db_updater;
mod geolite_resolver;
mod service;

pub use database::{GeoLiteDatabase, GeoLiteReader};
pub use db_updater::{GeoLiteDbDownloader, GeoLiteDbUpdater, HttpDbDownloader};
pub use geolite_resolver::GeoLiteResolver;
pub use service::{
    GeolocationDbUpdateError, GeolocationDbUpdater, IpLocationError, IpLocationResolver,
};

#[cfg(test)]
pub use service::{MockGeolocationDbUpdater, MockIpLocationResolver};
