//! Repository implementations.
//!
//! PostgreSQL repositories use runtime-checked SQLx queries mapped through
//! `FromRow` row types. [`InMemoryStore`] implements the same traits in process.
//!
//! # Repositories
//!
//! - [`PgVisitRepository`] - visits, locations and visit counts
//! - [`PgShortUrlRepository`] - short URLs with their domain and tags
//! - [`PgTagRepository`] - tag existence checks
//! - [`InMemoryStore`] - all of the above, without a database

pub mod in_memory;
pub mod pg_short_url_repository;
pub mod pg_tag_repository;
pub mod pg_visit_repository;
mod rows;

pub use in_memory::InMemoryStore;
pub use pg_short_url_repository::PgShortUrlRepository;
pub use pg_tag_repository::PgTagRepository;
pub use pg_visit_repository::PgVisitRepository;
