//! Value objects shared by entities, repositories and services.

pub mod short_url_edit;
pub mod short_url_identifier;
pub mod short_url_meta;
pub mod visitor;
pub mod visits_params;

pub use short_url_edit::{EditField, ShortUrlEdit};
pub use short_url_identifier::ShortUrlIdentifier;
pub use short_url_meta::{ImportedShortUrl, ShortUrlMeta};
pub use visitor::Visitor;
pub use visits_params::{DateRange, Paginator, VisitsParams};
