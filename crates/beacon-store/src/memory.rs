use crate::store::{KeyValueStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct MemoryState {
    pub entries: BTreeMap<String, String>,
}

/// In-memory key/value store, suitable for tests and for hosts that provide
/// their own persistence outside this crate.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyValueStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: MemoryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn snapshot(&self) -> StoreResult<MemoryState> {
        let state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))?;
        Ok(state.clone())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))?;
        Ok(state.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))?;
        state.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))?;
        state.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let state = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))?;
        Ok(state.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_expected_value_returned() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1".to_string()).expect("set should succeed");
        assert_eq!(store.get("a").expect("get should succeed").as_deref(), Some("1"));
    }

    #[test]
    fn remove_expected_key_absent() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1".to_string()).expect("set should succeed");
        store.remove("a").expect("remove should succeed");
        assert_eq!(store.get("a").expect("get should succeed"), None);
        assert!(store.keys().expect("keys should succeed").is_empty());
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryKeyValueStore::new();
        let alias = store.clone();
        alias.set("a", "1".to_string()).expect("set should succeed");
        assert_eq!(store.get("a").expect("get should succeed").as_deref(), Some("1"));
    }
}
