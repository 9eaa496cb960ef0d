//! Process-wide caches shared by every search.
//!
//! Two tiers sit on top of one TTL cache implementation:
//!
//! - [`TagCache`]: object tags by `(backend_id, path)`
//! - [`ResultCache`]: final responses by query signature, stored as
//!   versioned and checksummed payloads
//!
//! A TTL of zero disables a tier. Expired entries are dropped on read and
//! by the periodic sweep run by [`crate::search::SearchService`].

mod entry;
mod result_cache;
mod tag_cache;
mod ttl;

pub use entry::CacheEntry;
pub use result_cache::{CachedPayload, ResultCache, RESULT_SCHEMA_VERSION};
pub use tag_cache::TagCache;
pub use ttl::{CacheStats, TtlCache};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Cache tier sizing and lifetimes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Tag cache TTL in milliseconds; 0 disables the tier
    pub tag_cache_ttl_ms: u64,

    #[validate(range(min = 1))]
    pub tag_cache_capacity: u64,

    /// Result cache TTL in milliseconds; 0 disables the tier
    pub result_cache_ttl_ms: u64,

    #[validate(range(min = 1))]
    pub result_cache_capacity: u64,

    /// Interval of the background expired-entry sweep
    #[validate(range(min = 100))]
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tag_cache_ttl_ms: 15 * 60 * 1000,
            tag_cache_capacity: 100_000,
            result_cache_ttl_ms: 5 * 60 * 1000,
            result_cache_capacity: 1_000,
            sweep_interval_ms: 60 * 1000,
        }
    }
}

impl CacheConfig {
    pub fn tag_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.tag_cache_ttl_ms)
    }

    pub fn result_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.result_cache_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Build both tiers
    pub fn build(&self) -> (TagCache, ResultCache) {
        (
            TagCache::new(self.tag_cache_capacity, self.tag_cache_ttl()),
            ResultCache::new(self.result_cache_capacity, self.result_cache_ttl()),
        )
    }
}
