use super::entry::CacheEntry;
use crate::metrics::CACHE_LOOKUPS_TOTAL;
use moka::future::Cache;
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Hit/miss counters and size of one cache tier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub enabled: bool,
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Bounded, TTL-evicting cache. A zero TTL disables the tier entirely:
/// lookups miss and inserts are dropped.
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: &'static str,
    ttl: Duration,
    cache: Option<Cache<K, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, max_capacity: u64, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .name(name)
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build()
        });

        Self {
            name,
            ttl,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let Some(cache) = &self.cache else {
            return None;
        };

        match cache.get(key).await {
            Some(entry) if !entry.is_expired() => {
                self.record(true);
                Some(entry.value)
            }
            Some(_) => {
                cache.invalidate(key).await;
                self.record(false);
                None
            }
            None => {
                self.record(false);
                None
            }
        }
    }

    /// Last write wins
    pub async fn insert(&self, key: K, value: V) {
        if let Some(cache) = &self.cache {
            cache.insert(key, CacheEntry::new(value, self.ttl)).await;
        }
    }

    pub async fn invalidate(&self, key: &K) {
        if let Some(cache) = &self.cache {
            cache.invalidate(key).await;
        }
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Evict expired entries now instead of on the next read
    pub async fn sweep(&self) {
        if let Some(cache) = &self.cache {
            cache.run_pending_tasks().await;
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.as_ref().map_or(0, |cache| cache.entry_count())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.to_string(),
            enabled: self.is_enabled(),
            entries: self.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record(&self, hit: bool) {
        let (counter, label) = if hit {
            (&self.hits, "hit")
        } else {
            (&self.misses, "miss")
        };
        counter.fetch_add(1, Ordering::Relaxed);
        CACHE_LOOKUPS_TOTAL
            .with_label_values(&[self.name, label])
            .inc();
    }
}
