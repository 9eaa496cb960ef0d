use std::time::{Duration, Instant};

/// A cached value stamped with its insertion time and time-to-live
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }

    /// Expired entries are treated as absent
    pub fn is_expired(&self) -> bool {
        self.age() >= self.ttl
    }
}
