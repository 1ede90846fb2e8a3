//! Domain entity representing the host a short URL is served from.

/// A domain that serves short URLs.
///
/// Each domain acts as a namespace for short codes, allowing the same short
/// code to exist once per domain. Short URLs without a domain live on the
/// service's default domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Assigned on persistence.
    pub id: Option<i64>,
    pub authority: String,
}

impl Domain {
    /// Creates a domain that has not been persisted yet.
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            id: None,
            authority: authority.into(),
        }
    }

    /// Creates a domain that already has a storage identifier.
    pub fn persisted(id: i64, authority: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            authority: authority.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_creation() {
        let domain = Domain::new("s.example.com");

        assert!(domain.id.is_none());
        assert_eq!(domain.authority, "s.example.com");
    }

    #[test]
    fn test_persisted_domain() {
        let domain = Domain::persisted(7, "old.example.com");

        assert_eq!(domain.id, Some(7));
        assert_eq!(domain.authority, "old.example.com");
    }
}
