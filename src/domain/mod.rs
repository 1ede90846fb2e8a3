//! Domain layer: entities, value objects, events and boundary traits.
//!
//! - [`entities`] - short URLs, visits and their relations
//! - [`models`] - value objects used as operation inputs and outputs
//! - [`repositories`] - storage contracts
//! - [`relation_resolver`] - how a short URL's domain and tags are resolved
//! - [`visit_event`] - pipeline events and listener traits
//! - [`visit_worker`] - channel-backed dispatcher and the worker consuming it
//!
//! # Visit Processing Flow
//!
//! 1. A visit is recorded synchronously and [`visit_event::VisitOccurred`] is dispatched
//! 2. [`visit_worker::run_visit_worker`] routes it to the location stage
//! 3. The location stage dispatches [`visit_event::VisitLocated`]
//! 4. The worker routes that to the notification stage

pub mod entities;
pub mod models;
pub mod relation_resolver;
pub mod repositories;
pub mod visit_event;
pub mod visit_worker;
