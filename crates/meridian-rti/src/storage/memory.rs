#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use super::{SaveStore, StorageError};

/// In-memory save store for testing and simulation
///
/// Snapshots are keyed by `(federation, label)` in a `BTreeMap`, so labels
/// list in order. State is wrapped in Arc<Mutex<>> to
/// allow Clone and concurrent access; `lock().expect()` panics if the mutex
/// is poisoned, which is acceptable for test code.
#[derive(Clone, Default)]
pub struct MemorySaveStore {
    inner: Arc<Mutex<BTreeMap<(String, String), Vec<u8>>>>,
}

impl MemorySaveStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored snapshots.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").len()
    }
}

impl SaveStore for MemorySaveStore {
    #[allow(clippy::expect_used)]
    fn store_snapshot(
        &self,
        federation: &str,
        label: &str,
        snapshot: &[u8],
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.insert((federation.to_string(), label.to_string()), snapshot.to_vec());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn load_snapshot(&self, federation: &str, label: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.get(&(federation.to_string(), label.to_string())).cloned())
    }

    #[allow(clippy::expect_used)]
    fn list_labels(&self, federation: &str) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner
            .keys()
            .filter(|(name, _)| name == federation)
            .map(|(_, label)| label.clone())
            .collect())
    }

    #[allow(clippy::expect_used)]
    fn remove_federation(&self, federation: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.retain(|(name, _), _| name != federation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_load() {
        let store = MemorySaveStore::new();
        store.store_snapshot("fed", "noon", &[1, 2, 3]).unwrap();

        assert_eq!(store.load_snapshot("fed", "noon").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.load_snapshot("fed", "dusk").unwrap(), None);
        assert_eq!(store.load_snapshot("other", "noon").unwrap(), None);
    }

    #[test]
    fn overwrite_replaces() {
        let store = MemorySaveStore::new();
        store.store_snapshot("fed", "noon", &[1]).unwrap();
        store.store_snapshot("fed", "noon", &[2]).unwrap();

        assert_eq!(store.load_snapshot("fed", "noon").unwrap(), Some(vec![2]));
        assert_eq!(store.snapshot_count(), 1);
    }

    #[test]
    fn labels_are_per_federation() {
        let store = MemorySaveStore::new();
        store.store_snapshot("a", "z", &[]).unwrap();
        store.store_snapshot("a", "m", &[]).unwrap();
        store.store_snapshot("b", "x", &[]).unwrap();

        assert_eq!(store.list_labels("a").unwrap(), vec!["m".to_string(), "z".to_string()]);

        store.remove_federation("a").unwrap();
        assert!(store.list_labels("a").unwrap().is_empty());
        assert_eq!(store.snapshot_count(), 1);
    }
}
