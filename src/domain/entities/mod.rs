//! Core domain entities.
//!
//! - [`ShortUrl`] - a short code pointing to a long URL, plus the rules deciding
//!   whether it can be visited
//! - [`Visit`] - a recorded hit, with its [`VisitTarget`] discriminant and an
//!   optional [`VisitLocation`]
//! - [`Domain`], [`Tag`] - relations of a short URL
//! - [`ApiKey`], [`RoleDefinition`], [`AuthorizationScope`] - what a caller may see
//!
//! New records are described with separate input types (`NewVisit`), the same
//! way persisted and unpersisted data are kept apart elsewhere.

pub mod api_key;
pub mod domain;
pub mod short_url;
pub mod tag;
pub mod visit;
pub mod visit_location;

pub use api_key::{ApiKey, AuthorizationScope, Role, RoleDefinition};
pub use domain::Domain;
pub use short_url::{ShortCodeCannotBeRegenerated, ShortUrl};
pub use tag::Tag;
pub use visit::{NewVisit, Visit, VisitTarget};
pub use visit_location::VisitLocation;
