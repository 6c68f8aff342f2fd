//! Policy knobs for cache-aside wrapping.

use std::time::Duration;

/// Default entry lifetime when a namespace does not configure one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Per-namespace cache policy.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// How long a stored result stays valid.
    pub ttl: Duration,

    /// Treat a store failure during lookup as a miss instead of an error.
    /// Writes still surface store failures.
    pub degrade_on_read_error: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            degrade_on_read_error: false,
        }
    }
}

impl CachePolicy {
    /// Create a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}
