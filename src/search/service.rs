use crate::backends::{BackendConnector, BackendRegistry};
use crate::cache::{CacheConfig, CacheStats};
use crate::error::{EngineError, Result};
use crate::models::{Query, SearchResponse};
use crate::scoring::ScoringConfig;
use crate::search::config::SearchConfig;
use crate::search::orchestrator::SearchOrchestrator;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Long-lived search engine: one orchestrator, its caches and the
/// background sweep that drops expired cache entries
pub struct SearchService {
    orchestrator: Arc<SearchOrchestrator>,

    /// How often the sweep runs
    sweep_interval: Duration,

    /// Service running state
    running: Arc<RwLock<bool>>,
}

impl SearchService {
    pub fn new(
        registry: Arc<BackendRegistry>,
        search: SearchConfig,
        cache: &CacheConfig,
        scoring: ScoringConfig,
    ) -> Self {
        let (tag_cache, result_cache) = cache.build();
        let orchestrator = SearchOrchestrator::new(registry, search)
            .with_scoring(scoring)
            .with_caches(Arc::new(tag_cache), Arc::new(result_cache));

        Self {
            orchestrator: Arc::new(orchestrator),
            sweep_interval: cache.sweep_interval(),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start the background cache sweep
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(EngineError::Internal(
                "Search service already running".to_string(),
            ));
        }
        *running = true;
        drop(running);

        info!(
            backends = self.orchestrator.registry().len(),
            sweep_interval_ms = self.sweep_interval.as_millis() as u64,
            "Starting search service"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let running = Arc::clone(&self.running);
        let interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;

                if !*running.read().await {
                    break;
                }

                orchestrator.tag_cache().sweep().await;
                orchestrator.result_cache().sweep().await;
                debug!(
                    tag_entries = orchestrator.tag_cache().stats().entries,
                    result_entries = orchestrator.result_cache().stats().entries,
                    "Swept expired cache entries"
                );
            }
        });

        Ok(())
    }

    /// Stop the background sweep
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Err(EngineError::Internal(
                "Search service not running".to_string(),
            ));
        }
        *running = false;

        info!("Stopping search service");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn search(&self, query: Query) -> Result<SearchResponse> {
        self.orchestrator.search(query).await
    }

    pub fn register_backend(&self, connector: Arc<dyn BackendConnector>) -> Result<()> {
        self.orchestrator.registry().register(connector)
    }

    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }

    /// Drop every cached tag set and response
    pub fn clear_caches(&self) {
        self.orchestrator.tag_cache().invalidate_all();
        self.orchestrator.result_cache().invalidate_all();
        info!("Search caches cleared");
    }

    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            is_running: *self.running.read().await,
            backends: self.orchestrator.registry().ids(),
            tag_cache: self.orchestrator.tag_cache().stats(),
            result_cache: self.orchestrator.result_cache().stats(),
            available_permits: self.orchestrator.limiter().available_permits(),
        }
    }
}

/// Search service statistics
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub is_running: bool,
    pub backends: Vec<String>,
    pub tag_cache: CacheStats,
    pub result_cache: CacheStats,
    pub available_permits: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{InMemoryObjectStore, StoredObject};
    use crate::backends::{BackendDescriptor, BackendKind, ObjectStoreConnector};

    fn service() -> SearchService {
        let store = InMemoryObjectStore::new("bucket");
        store.put(StoredObject::new("NA12878.bam", 10));
        store.put(StoredObject::new("NA12878.bam.bai", 1));

        let registry = Arc::new(BackendRegistry::new());
        registry
            .register(Arc::new(ObjectStoreConnector::new(
                BackendDescriptor::new("mem-a", BackendKind::ObjectStore, "bucket"),
                Arc::new(store),
            )))
            .unwrap();

        SearchService::new(
            registry,
            SearchConfig::default(),
            &CacheConfig::default(),
            ScoringConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_service_start_stop() {
        let service = service();
        assert!(!service.is_running().await);

        service.start().await.unwrap();
        assert!(service.is_running().await);
        assert!(service.start().await.is_err());

        service.stop().await.unwrap();
        assert!(!service.is_running().await);
        assert!(service.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_search_and_clear_caches() {
        let service = service();

        let first = service.search(Query::new(["NA12878"])).await.unwrap();
        assert_eq!(first.results.len(), 1);
        assert!(!first.from_cache);

        let second = service.search(Query::new(["na12878"])).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.results, first.results);

        service.clear_caches();
        let third = service.search(Query::new(["NA12878"])).await.unwrap();
        assert!(!third.from_cache);

        let stats = service.stats().await;
        assert_eq!(stats.backends, vec!["mem-a".to_string()]);
        assert_eq!(stats.result_cache.hits, 1);
    }
}
