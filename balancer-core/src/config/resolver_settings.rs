use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Scheme the resolver and picker are registered under.
    pub scheme: String,
    /// Upper bound for dialing the bootstrap authority.
    pub dial_timeout: Duration,
    /// Upper bound for one metadata RPC.
    pub discovery_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            scheme: "leader-aware".to_string(),
            dial_timeout: Duration::from_secs(5),
            discovery_timeout: Duration::from_secs(5),
        }
    }
}
