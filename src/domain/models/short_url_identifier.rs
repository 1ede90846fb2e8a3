//! Identifier of a short URL within its domain.

/// Short code plus the domain it belongs to.
///
/// `domain: None` designates the default domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortUrlIdentifier {
    pub short_code: String,
    pub domain: Option<String>,
}

impl ShortUrlIdentifier {
    pub fn new(short_code: impl Into<String>, domain: Option<String>) -> Self {
        Self {
            short_code: short_code.into(),
            domain: domain.filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn for_default_domain(short_code: impl Into<String>) -> Self {
        Self::new(short_code, None)
    }
}
