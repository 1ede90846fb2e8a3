//! Repository trait definitions for the domain layer.
//!
//! These traits abstract storage behind the contracts the pipeline needs.
//! Implementations live in `crate::infrastructure::persistence`; mock
//! implementations are generated via `mockall` for unit tests.
//!
//! - [`VisitRepository`] - visits, locations and visit counts
//! - [`ShortUrlRepository`] - short URL persistence and lookups
//! - [`TagRepository`] - tag existence checks

pub mod short_url_repository;
pub mod tag_repository;
pub mod visit_repository;

pub use short_url_repository::ShortUrlRepository;
pub use tag_repository::TagRepository;
pub use visit_repository::{VisitRepository, VisitsFilter};

#[cfg(test)]
pub use short_url_repository::MockShortUrlRepository;
#[cfg(test)]
pub use tag_repository::MockTagRepository;
#[cfg(test)]
pub use visit_repository::MockVisitRepository;
