use super::ttl::{CacheStats, TtlCache};
use crate::models::{RecordKey, TagSet};
use std::time::Duration;

/// Tags by `(backend_id, path)`
pub struct TagCache {
    inner: TtlCache<RecordKey, TagSet>,
}

impl TagCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new("tags", max_capacity, ttl),
        }
    }

    pub async fn get(&self, backend_id: &str, path: &str) -> Option<TagSet> {
        self.inner.get(&key(backend_id, path)).await
    }

    /// Empty tag sets are cached too, so untagged objects are not re-fetched
    pub async fn put(&self, backend_id: &str, path: &str, tags: TagSet) {
        self.inner.insert(key(backend_id, path), tags).await;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub async fn sweep(&self) {
        self.inner.sweep().await;
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

fn key(backend_id: &str, path: &str) -> RecordKey {
    RecordKey {
        backend_id: backend_id.to_string(),
        path: path.to_string(),
    }
}
