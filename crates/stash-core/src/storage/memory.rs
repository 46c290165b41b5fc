use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{BackendError, StorageBackend};

/// In-memory backend used for session-scoped data and tests.
/// Clones share the same map, so a test can keep a handle to inspect what the
/// store wrote.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, BackendError> {
        self.inner.lock().map_err(|err| BackendError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), BackendError> {
        self.lock()?.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let backend = MemoryBackend::new();
        let handle = backend.clone();

        backend.set_item("k", "v").expect("set should succeed");
        assert_eq!(handle.get_item("k").expect("get"), Some("v".to_string()));
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.set_item("k", "v").expect("set should succeed");
        backend.remove_item("k").expect("remove should succeed");
        backend
            .remove_item("k")
            .expect("remove again should still succeed");

        assert_eq!(backend.get_item("k").expect("get"), None);
    }

    #[test]
    fn clear_drops_everything_and_keys_are_sorted() {
        let backend = MemoryBackend::new();
        backend.set_item("b", "2").expect("set");
        backend.set_item("a", "1").expect("set");
        assert_eq!(backend.keys().expect("keys"), vec!["a", "b"]);

        backend.clear().expect("clear");
        assert!(backend.is_empty());
        assert!(backend.keys().expect("keys").is_empty());
    }
}
