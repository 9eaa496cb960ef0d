use super::ttl::{CacheStats, TtlCache};
use crate::error::{EngineError, Result};
use crate::metrics::CACHE_LOOKUPS_TOTAL;
use crate::models::SearchResponse;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Bumped whenever the serialized response layout changes
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Serialized response plus what is needed to validate it on read
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub schema_version: u32,
    pub checksum: String,
    pub body: Arc<Vec<u8>>,
}

impl CachedPayload {
    pub fn encode(response: &SearchResponse) -> Result<Self> {
        let body = serde_json::to_vec(response)?;
        Ok(Self {
            schema_version: RESULT_SCHEMA_VERSION,
            checksum: checksum(&body),
            body: Arc::new(body),
        })
    }

    pub fn decode(&self) -> Result<SearchResponse> {
        if self.schema_version != RESULT_SCHEMA_VERSION {
            return Err(EngineError::CacheCorruption(format!(
                "schema version {} != {}",
                self.schema_version, RESULT_SCHEMA_VERSION
            )));
        }

        if checksum(&self.body) != self.checksum {
            return Err(EngineError::CacheCorruption("checksum mismatch".to_string()));
        }

        serde_json::from_slice(&self.body)
            .map_err(|e| EngineError::CacheCorruption(format!("undecodable payload: {e}")))
    }
}

fn checksum(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

/// Final responses by query signature
pub struct ResultCache {
    inner: TtlCache<String, CachedPayload>,
}

impl ResultCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new("results", max_capacity, ttl),
        }
    }

    /// Cached response for a signature. Entries that fail validation are
    /// evicted and reported as a miss.
    pub async fn get(&self, signature: &str) -> Option<SearchResponse> {
        let key = signature.to_string();
        let payload = self.inner.get(&key).await?;

        match payload.decode() {
            Ok(response) => Some(response),
            Err(err) => {
                tracing::warn!(
                    signature = %signature.get(..12).unwrap_or(signature),
                    error = %err,
                    "Evicting corrupt result cache entry"
                );
                CACHE_LOOKUPS_TOTAL
                    .with_label_values(&["results", "corrupt"])
                    .inc();
                self.inner.invalidate(&key).await;
                None
            }
        }
    }

    pub async fn put(&self, signature: &str, response: &SearchResponse) {
        if !self.inner.is_enabled() {
            return;
        }

        match CachedPayload::encode(response) {
            Ok(payload) => self.inner.insert(signature.to_string(), payload).await,
            Err(err) => tracing::warn!(error = %err, "Failed to encode response for caching"),
        }
    }

    #[cfg(test)]
    pub(crate) async fn put_payload(&self, signature: &str, payload: CachedPayload) {
        self.inner.insert(signature.to_string(), payload).await;
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
