use super::transport::Transport;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Active slaves, keyed by endpoint
///
/// Entries are only ever removed. Readers copy the current set so an
/// in-flight fan-out is unaffected by a concurrent removal.
pub struct ReplicaRegistry {
    replicas: RwLock<HashMap<String, Arc<dyn Transport>>>,
}

impl ReplicaRegistry {
    pub fn new(transports: impl IntoIterator<Item = Arc<dyn Transport>>) -> Self {
        let mut replicas: HashMap<String, Arc<dyn Transport>> = HashMap::new();
        for transport in transports {
            let endpoint = transport.endpoint().to_string();
            if replicas.contains_key(&endpoint) {
                warn!("Ignoring duplicate slave endpoint {}", endpoint);
                continue;
            }
            replicas.insert(endpoint, transport);
        }

        Self {
            replicas: RwLock::new(replicas),
        }
    }

    /// Copy of the active set, taken under the read lock
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn Transport>)> {
        self.replicas
            .read()
            .iter()
            .map(|(id, transport)| (id.clone(), Arc::clone(transport)))
            .collect()
    }

    /// Remove a slave. Only the first caller for a given id gets its transport back.
    pub fn remove(&self, slave_id: &str) -> Option<Arc<dyn Transport>> {
        self.replicas.write().remove(slave_id)
    }

    pub fn contains(&self, slave_id: &str) -> bool {
        self.replicas.read().contains_key(slave_id)
    }

    /// Active slave ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.replicas.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.replicas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InventoryEngine, LockingStrategy};
    use crate::replication::replica::ReplicaStore;
    use crate::replication::transport::LocalTransport;

    fn transport(endpoint: &str) -> Arc<dyn Transport> {
        let replica = Arc::new(ReplicaStore::new(Arc::new(InventoryEngine::new(
            LockingStrategy::Coarse,
        ))));
        Arc::new(LocalTransport::new(endpoint, replica))
    }

    #[test]
    fn test_registry_removal() {
        let registry = ReplicaRegistry::new(vec![transport("b"), transport("a"), transport("a")]);
        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);

        let snapshot = registry.snapshot();
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(!registry.contains("a"));
        assert_eq!(registry.len(), 1);

        // Snapshots taken earlier keep their transports
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ReplicaRegistry::new(Vec::new());
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }
}
