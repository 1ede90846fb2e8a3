//! Helpers shared across layers.
//!
//! - [`code_generator`] - random short code generation
//! - [`ip_address`] - remote address anonymization and locatability checks

pub mod code_generator;
pub mod ip_address;
