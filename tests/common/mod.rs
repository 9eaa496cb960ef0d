//! Shared fixtures for the integration tests

#![allow(dead_code)]

use genomics_file_search::backends::memory::{InMemoryObjectStore, StoredObject};
use genomics_file_search::backends::{
    BackendConnector, BackendDescriptor, BackendKind, BackendRegistry, ObjectStoreConnector,
};
use genomics_file_search::cache::CacheConfig;
use genomics_file_search::search::{SearchConfig, SearchOrchestrator};
use std::sync::Arc;

/// An in-memory bucket plus the connector that searches it
pub struct TestBucket {
    pub store: Arc<InMemoryObjectStore>,
    pub connector: Arc<dyn BackendConnector>,
}

impl TestBucket {
    pub fn new(id: &str, keys: &[&str]) -> Self {
        Self::with_objects(id, keys.iter().map(|k| StoredObject::new(*k, 1_000)))
    }

    pub fn with_objects(id: &str, objects: impl IntoIterator<Item = StoredObject>) -> Self {
        Self::from_store(id, InMemoryObjectStore::new(format!("{id}-bucket")), objects)
    }

    pub fn from_store(
        id: &str,
        store: InMemoryObjectStore,
        objects: impl IntoIterator<Item = StoredObject>,
    ) -> Self {
        for object in objects {
            store.put(object);
        }
        let store = Arc::new(store);
        let connector: Arc<dyn BackendConnector> = Arc::new(ObjectStoreConnector::new(
            BackendDescriptor::new(id, BackendKind::ObjectStore, format!("{id}-bucket")),
            store.clone(),
        ));
        Self { store, connector }
    }
}

pub fn registry(connectors: impl IntoIterator<Item = Arc<dyn BackendConnector>>) -> Arc<BackendRegistry> {
    let registry = Arc::new(BackendRegistry::new());
    for connector in connectors {
        registry.register(connector).unwrap();
    }
    registry
}

/// Orchestrator with the given search config and default caches
pub fn orchestrator(
    connectors: impl IntoIterator<Item = Arc<dyn BackendConnector>>,
    config: SearchConfig,
) -> SearchOrchestrator {
    SearchOrchestrator::new(registry(connectors), config)
}

/// Orchestrator whose caches are built from `cache`
pub fn orchestrator_with_cache(
    connectors: impl IntoIterator<Item = Arc<dyn BackendConnector>>,
    config: SearchConfig,
    cache: CacheConfig,
) -> SearchOrchestrator {
    let (tags, results) = cache.build();
    orchestrator(connectors, config).with_caches(Arc::new(tags), Arc::new(results))
}

/// Caches switched off, so every search reaches the backends
pub fn no_cache() -> CacheConfig {
    CacheConfig {
        tag_cache_ttl_ms: 0,
        result_cache_ttl_ms: 0,
        ..Default::default()
    }
}

/// One sample's sequencing outputs plus an unrelated sample
pub const NA12878_KEYS: &[&str] = &[
    "project/NA12878.bam",
    "project/NA12878.bam.bai",
    "project/NA12878_R1.fastq.gz",
    "project/NA12878_R2.fastq.gz",
    "project/NA12878.vcf.gz",
    "project/NA12878.vcf.gz.tbi",
    "project/HG002.bam",
    "project/HG002.bam.bai",
];
