//! Infrastructure layer for external integrations.
//!
//! Implements the boundaries the pipeline depends on.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL and in-memory repositories
//! - [`geolocation`] - GeoLite2 lookups and database refreshes
//! - [`hub`] - Real-time notification hubs (Redis and no-op implementations)

pub mod geolocation;
pub mod hub;
pub mod persistence;
