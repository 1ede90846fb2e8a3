//! API key roles and the authorization scope derived from them.

use std::collections::BTreeMap;

/// Closed set of roles an API key can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Only short URLs created with the same API key are visible.
    AuthoredShortUrls,
    /// Only short URLs served from one specific domain are visible.
    DomainSpecific,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AuthoredShortUrls => "AUTHORED_SHORT_URLS",
            Role::DomainSpecific => "DOMAIN_SPECIFIC",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "AUTHORED_SHORT_URLS" => Some(Role::AuthoredShortUrls),
            "DOMAIN_SPECIFIC" => Some(Role::DomainSpecific),
            _ => None,
        }
    }
}

const DOMAIN_ID_META: &str = "domain_id";

/// A role plus the metadata it applies to.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    role: Role,
    meta: BTreeMap<String, String>,
}

impl RoleDefinition {
    pub fn for_authored_short_urls() -> Self {
        Self {
            role: Role::AuthoredShortUrls,
            meta: BTreeMap::new(),
        }
    }

    pub fn for_domain(domain_id: i64) -> Self {
        Self {
            role: Role::DomainSpecific,
            meta: BTreeMap::from([(DOMAIN_ID_META.to_string(), domain_id.to_string())]),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn role_name(&self) -> &'static str {
        self.role.as_str()
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    /// Domain a [`Role::DomainSpecific`] definition is bound to.
    pub fn domain_id(&self) -> Option<i64> {
        self.meta.get(DOMAIN_ID_META)?.parse().ok()
    }
}

/// An API key as seen by the visit pipeline: an identifier and its roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub id: i64,
    pub name: Option<String>,
    roles: Vec<RoleDefinition>,
}

impl ApiKey {
    /// An API key without roles; it sees everything.
    pub fn admin(id: i64) -> Self {
        Self {
            id,
            name: None,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(id: i64, roles: Vec<RoleDefinition>) -> Self {
        Self {
            id,
            name: None,
            roles,
        }
    }

    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.roles.is_empty()
    }

    /// Filter to apply to queries made with this key.
    ///
    /// Returns `None` for admin keys, meaning unrestricted.
    pub fn scope(&self) -> Option<AuthorizationScope> {
        if self.is_admin() {
            return None;
        }

        Some(AuthorizationScope::from_roles(self.id, &self.roles))
    }
}

/// Caller-bound filter restricting which short URLs (and their visits and
/// tags) a query may see.
///
/// All set conditions must hold at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationScope {
    pub author_api_key_id: Option<i64>,
    pub domain_id: Option<i64>,
}

impl AuthorizationScope {
    pub fn from_roles(api_key_id: i64, roles: &[RoleDefinition]) -> Self {
        roles
            .iter()
            .fold(Self::default(), |mut scope, definition| {
                match definition.role() {
                    Role::AuthoredShortUrls => scope.author_api_key_id = Some(api_key_id),
                    Role::DomainSpecific => scope.domain_id = definition.domain_id(),
                }
                scope
            })
    }

    /// Checks a short URL's ownership data against this scope.
    pub fn allows(&self, author_api_key_id: Option<i64>, domain_id: Option<i64>) -> bool {
        let author_ok = self
            .author_api_key_id
            .is_none_or(|id| author_api_key_id == Some(id));
        let domain_ok = self.domain_id.is_none_or(|id| domain_id == Some(id));

        author_ok && domain_ok
    }
}
