//! Registry of searchable backends.

use super::BackendConnector;
use crate::error::{EngineError, Result};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connectors by backend id
#[derive(Default)]
pub struct BackendRegistry {
    backends: DashMap<String, Arc<dyn BackendConnector>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector. Ids must be unique.
    pub fn register(&self, connector: Arc<dyn BackendConnector>) -> Result<()> {
        let id = connector.id().to_string();
        match self.backends.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::Configuration(
                format!("backend '{id}' is already registered"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                info!(
                    backend = %id,
                    kind = %connector.descriptor().kind,
                    enabled = connector.descriptor().enabled,
                    "Registered backend"
                );
                slot.insert(connector);
                Ok(())
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn BackendConnector>> {
        debug!(backend = %id, "Removing backend from registry");
        self.backends.remove(id).map(|(_, connector)| connector)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn BackendConnector>> {
        self.backends.get(id).map(|entry| entry.value().clone())
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Enabled connectors selected by an allow-list, sorted by id.
    ///
    /// An empty allow-list selects every enabled backend. Unknown ids are
    /// ignored with a warning.
    pub fn resolve(&self, allow: &BTreeSet<String>) -> Vec<Arc<dyn BackendConnector>> {
        for id in allow.iter().filter(|id| !self.backends.contains_key(*id)) {
            warn!(backend = %id, "Ignoring unknown backend in allow-list");
        }

        let mut selected: Vec<Arc<dyn BackendConnector>> = self
            .backends
            .iter()
            .filter(|entry| allow.is_empty() || allow.contains(entry.key()))
            .filter(|entry| entry.value().descriptor().enabled)
            .map(|entry| entry.value().clone())
            .collect();
        selected.sort_by(|a, b| a.id().cmp(b.id()));
        selected
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::InMemoryObjectStore;
    use crate::backends::{BackendDescriptor, BackendKind, ObjectStoreConnector};

    fn connector(id: &str, enabled: bool) -> Arc<dyn BackendConnector> {
        let mut descriptor = BackendDescriptor::new(id, BackendKind::ObjectStore, "bucket");
        if !enabled {
            descriptor = descriptor.disabled();
        }
        Arc::new(ObjectStoreConnector::new(
            descriptor,
            Arc::new(InMemoryObjectStore::new("bucket")),
        ))
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = BackendRegistry::new();
        registry.register(connector("a", true)).unwrap();
        assert!(registry.register(connector("a", true)).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve() {
        let registry = BackendRegistry::new();
        registry.register(connector("c", true)).unwrap();
        registry.register(connector("a", true)).unwrap();
        registry.register(connector("b", false)).unwrap();

        let all: Vec<String> = registry
            .resolve(&BTreeSet::new())
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(all, vec!["a", "c"]);

        let allow: BTreeSet<String> = ["c", "b", "zzz"].iter().map(|s| s.to_string()).collect();
        let some: Vec<String> = registry
            .resolve(&allow)
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(some, vec!["c"]);

        assert!(registry.remove("c").is_some());
        assert_eq!(registry.ids(), vec!["a", "b"]);
    }
}
