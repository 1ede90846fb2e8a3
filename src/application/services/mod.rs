//! Services of the visit pipeline.

pub mod updates_generator;
pub mod visit_locator;
pub mod visit_notifier;
pub mod visits_stats_service;
pub mod visits_tracker;

pub use updates_generator::UpdatesGenerator;
pub use visit_locator::{LocateOutcome, VisitLocator, run_locate_sweep};
pub use visit_notifier::VisitNotifier;
pub use visits_stats_service::{VisitsStats, VisitsStatsService};
pub use visits_tracker::{TrackingOptions, VisitsTracker};
