//! Crate-wide error type.
//!
//! Only the aggregator's lookup failures ([`AppError::ShortUrlNotFound`],
//! [`AppError::TagNotFound`]) are meant to reach an external caller. Pipeline
//! stages contain their own failures and never return [`AppError`].

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No URL found with short code \"{short_code}\"{}", domain_suffix(.domain))]
    ShortUrlNotFound {
        short_code: String,
        domain: Option<String>,
    },

    #[error("Tag with name \"{tag}\" could not be found")]
    TagNotFound { tag: String },

    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    Conflict { message: String, details: Value },

    #[error("{message}")]
    Internal { message: String, details: Value },
}

fn domain_suffix(domain: &Option<String>) -> String {
    domain
        .as_deref()
        .map(|d| format!(" for domain \"{d}\""))
        .unwrap_or_default()
}

impl AppError {
    pub fn short_url_not_found(short_code: impl Into<String>, domain: Option<String>) -> Self {
        Self::ShortUrlNotFound {
            short_code: short_code.into(),
            domain,
        }
    }

    pub fn tag_not_found(tag: impl Into<String>) -> Self {
        Self::TagNotFound { tag: tag.into() }
    }

    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ShortUrlNotFound { .. } => "short_url_not_found",
            AppError::TagNotFound { .. } => "tag_not_found",
            AppError::Validation { .. } => "validation_error",
            AppError::Conflict { .. } => "conflict",
            AppError::Internal { .. } => "internal_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::ShortUrlNotFound { .. } | AppError::TagNotFound { .. }
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error()
            && db.is_unique_violation()
        {
            return AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": db.constraint() }),
            );
        }

        AppError::internal("Database error", json!({ "reason": e.to_string() }))
    }
}
