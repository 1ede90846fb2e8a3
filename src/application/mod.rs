//! Application layer services orchestrating the visit pipeline.
//!
//! Services consume the repository and boundary traits and contain every
//! pipeline failure they are responsible for.
//!
//! # Available Services
//!
//! - [`services::VisitsTracker`] - records visits and emits `VisitOccurred`
//! - [`services::VisitLocator`] - location stage
//! - [`services::VisitNotifier`] - notification stage
//! - [`services::VisitsStatsService`] - visit counts and listings

pub mod services;
