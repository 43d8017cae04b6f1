//! Observation store shared by the host monitors and the renderer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::host::HostSpec;
use crate::types::HostObservation;

/// Host name to latest observation, plus the declared host order.
///
/// Each entry has exactly one writer (its host's monitor). Entries exist
/// for every configured host from construction onward and are never
/// removed.
#[derive(Clone)]
pub struct ObservationStore {
    order: Arc<Vec<String>>,
    entries: Arc<RwLock<HashMap<String, HostObservation>>>,
}

impl ObservationStore {
    /// Store with a `Waiting` entry for every host.
    pub fn new(hosts: &[HostSpec]) -> Self {
        let order: Vec<String> = hosts.iter().map(|h| h.name.clone()).collect();
        let entries = order
            .iter()
            .map(|name| (name.clone(), HostObservation::default()))
            .collect();
        Self {
            order: Arc::new(order),
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Reset a configured host's entry to `Waiting`.
    pub async fn initialize(&self, name: &str) -> bool {
        self.write(name, HostObservation::default()).await
    }

    /// Replace a host's entry. Unknown names are refused so the key set
    /// never drifts from the configuration.
    pub async fn write(&self, name: &str, observation: HostObservation) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(name) {
            Some(entry) => {
                *entry = observation;
                true
            }
            None => {
                warn!("Refusing write for unconfigured host '{}'", name);
                false
            }
        }
    }

    /// Consistent copy of every entry at one instant.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let entries = self.entries.read().await.clone();
        StoreSnapshot {
            order: Arc::clone(&self.order),
            entries,
        }
    }
}

/// Point-in-time copy of the store, detached from writers.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    order: Arc<Vec<String>>,
    entries: HashMap<String, HostObservation>,
}

impl StoreSnapshot {
    pub fn get(&self, name: &str) -> Option<&HostObservation> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Entries in declared host order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostObservation)> + '_ {
        self.order.iter().filter_map(move |name| {
            self.entries
                .get(name)
                .map(|observation| (name.as_str(), observation))
        })
    }

    /// Serializable form, in declared order.
    pub fn to_report(&self) -> Vec<HostReport<'_>> {
        self.iter()
            .map(|(name, observation)| HostReport { name, observation })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct HostReport<'a> {
    pub name: &'a str,
    pub observation: &'a HostObservation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Address;
    use crate::types::StatusKind;

    fn hosts(names: &[&str]) -> Vec<HostSpec> {
        names
            .iter()
            .map(|n| HostSpec::new(*n, Address::parse(n).unwrap(), false))
            .collect()
    }

    #[tokio::test]
    async fn test_new_store_has_waiting_entry_per_host() {
        let store = ObservationStore::new(&hosts(&["b", "a", "c"]));
        let snapshot = store.snapshot().await;
        let names: Vec<&str> = snapshot.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert!(snapshot.iter().all(|(_, o)| o.status == StatusKind::Waiting));
    }

    #[tokio::test]
    async fn test_write_unknown_host_is_refused() {
        let store = ObservationStore::new(&hosts(&["a"]));
        assert!(!store.write("ghost", HostObservation::default()).await);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("ghost").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_writes() {
        let store = ObservationStore::new(&hosts(&["a"]));
        let before = store.snapshot().await;
        store
            .write("a", HostObservation::default().with_status(StatusKind::Timeout))
            .await;
        assert_eq!(before.get("a").unwrap().status, StatusKind::Waiting);
        assert_eq!(store.snapshot().await.get("a").unwrap().status, StatusKind::Timeout);
    }

    #[tokio::test]
    async fn test_initialize_resets_to_waiting() {
        let store = ObservationStore::new(&hosts(&["a"]));
        store
            .write("a", HostObservation::default().with_status(StatusKind::CommandError))
            .await;
        assert!(store.initialize("a").await);
        assert_eq!(store.snapshot().await.get("a").unwrap().status, StatusKind::Waiting);
    }
}
