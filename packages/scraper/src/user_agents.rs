//! Pool of browser user agents.

use rand::{Rng, rng};
use serde::{Deserialize, Serialize};

/// Used when the pool is empty.
pub const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.4844.51 Safari/537.36";

/// A pool entry: either a bare string or `{"useragent": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum Entry {
    Plain(String),
    Tagged { useragent: String },
}

impl Entry {
    fn as_str(&self) -> &str {
        match self {
            Self::Plain(ua) | Self::Tagged { useragent: ua } => ua,
        }
    }
}

/// User agents a worker may present; one is chosen per worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAgents(Vec<Entry>);

impl UserAgents {
    /// Number of agents in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Picks an agent uniformly at random.
    #[must_use]
    pub fn choose(&self) -> &str {
        if self.is_empty() {
            log::warn!("User agent pool is empty, using the fallback agent");
            return FALLBACK_USER_AGENT;
        }
        let i = rng().random_range(0..self.0.len());
        self.0[i].as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_tagged_entries() {
        let pool: UserAgents =
            serde_json::from_str(r#"["agent-a", {"useragent": "agent-b"}]"#).unwrap();
        assert_eq!(pool.len(), 2);
        for _ in 0..20 {
            assert!(["agent-a", "agent-b"].contains(&pool.choose()));
        }
    }

    #[test]
    fn empty_pool_falls_back() {
        let pool: UserAgents = serde_json::from_str("[]").unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.choose(), FALLBACK_USER_AGENT);
    }
}
