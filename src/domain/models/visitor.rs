//! Request metadata captured when a visit is recorded.

/// Maximum stored length for user agent and referer values.
const MAX_HEADER_LENGTH: usize = 512;

/// Client information for a single hit.
///
/// All fields are optional to handle missing headers gracefully; overly long
/// header values are truncated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visitor {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub remote_address: Option<String>,
    pub visited_url: Option<String>,
}

impl Visitor {
    pub fn new(
        user_agent: Option<&str>,
        referer: Option<&str>,
        remote_address: Option<String>,
        visited_url: Option<&str>,
    ) -> Self {
        Self {
            user_agent: user_agent.map(truncate),
            referer: referer.map(truncate),
            remote_address,
            visited_url: visited_url.map(truncate),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

fn truncate(value: &str) -> String {
    value.chars().take(MAX_HEADER_LENGTH).collect()
}
