use crate::entry::{StoreEntry, StorePayload};
use crate::store::{KeyValueStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Manages server-issued state payloads with per-entry time-to-live on top of
/// an injected [`KeyValueStore`].
///
/// The active-set filter runs on every read; an expired entry is never
/// returned even if it is still physically present in the backing store.
/// Eviction of expired entries during a read is an optimization on top of
/// that guarantee.
pub struct StoreManager {
    store: Arc<dyn KeyValueStore>,
    // Coarse lock serializing compound read-modify sequences. Individual
    // backend operations are already atomic; no I/O beyond the backing store
    // happens while this is held.
    guard: Mutex<()>,
}

impl StoreManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    /// Saves the given payloads in input order. A payload with
    /// `max_age <= 0` deletes any existing entry under the same key instead
    /// of being persisted. Duplicate keys within one call resolve last-wins.
    pub fn save(&self, payloads: &[StorePayload]) -> StoreResult<()> {
        if payloads.is_empty() {
            return Ok(());
        }

        let _guard = self
            .guard
            .lock()
            .map_err(|_| StoreError::Backend("store manager mutex poisoned".to_string()))?;

        for payload in payloads {
            // The server marks entries for deletion with a max age of 0 or -1.
            if payload.max_age <= 0.0 {
                trace!(key = %payload.key, "removing store entry with non-positive max age");
                self.store.remove(&payload.key)?;
                continue;
            }

            let entry = StoreEntry::new(payload.clone());
            let serialized = serde_json::to_string(&entry)
                .map_err(|err| StoreError::Serialization(err.to_string()))?;
            self.store.set(&payload.key, serialized)?;
        }

        debug!(count = payloads.len(), "processed store payload(s)");
        Ok(())
    }

    /// Returns the non-expired entries keyed by payload key, evicting any
    /// expired or undecodable entries from the backing store along the way.
    pub fn active_entries(&self) -> StoreResult<BTreeMap<String, StoreEntry>> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| StoreError::Backend("store manager mutex poisoned".to_string()))?;

        let mut active = BTreeMap::new();
        let mut expired = Vec::new();

        for key in self.store.keys()? {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            match serde_json::from_str::<StoreEntry>(&raw) {
                Ok(entry) if entry.is_expired() => expired.push(key),
                Ok(entry) => {
                    active.insert(key, entry);
                }
                Err(err) => {
                    debug!(%key, %err, "failed to decode store entry, evicting");
                    expired.push(key);
                }
            }
        }

        for key in &expired {
            self.store.remove(key)?;
        }
        if !expired.is_empty() {
            trace!(count = expired.len(), "evicted expired store entries");
        }

        Ok(active)
    }

    /// Convenience projection of [`Self::active_entries`] as a payload list.
    /// Order is unspecified but stable within one call.
    pub fn active_payloads(&self) -> StoreResult<Vec<StorePayload>> {
        Ok(self
            .active_entries()?
            .into_values()
            .map(|entry| entry.payload)
            .collect())
    }

    /// Removes every persisted entry, active or not.
    pub fn delete_all(&self) -> StoreResult<()> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| StoreError::Backend("store manager mutex poisoned".to_string()))?;
        for key in self.store.keys()? {
            self.store.remove(&key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKeyValueStore;
    use std::time::Duration;

    fn manager() -> StoreManager {
        StoreManager::new(Arc::new(MemoryKeyValueStore::new()))
    }

    fn payload(key: &str, value: &str, max_age: f64) -> StorePayload {
        StorePayload {
            key: key.to_string(),
            value: value.to_string(),
            max_age,
        }
    }

    #[test]
    fn save_then_active_entries_expected_matching_values() {
        let manager = manager();
        manager
            .save(&[payload("a", "1", 100.0), payload("b", "2", 100.0)])
            .expect("save should succeed");

        let active = manager.active_entries().expect("read should succeed");
        assert_eq!(active.len(), 2);
        assert_eq!(active["a"].payload.value, "1");
        assert_eq!(active["b"].payload.value, "2");
    }

    #[test]
    fn save_with_non_positive_max_age_expected_existing_entry_removed() {
        let manager = manager();
        manager
            .save(&[payload("a", "1", 100.0)])
            .expect("save should succeed");
        manager
            .save(&[payload("a", "1", 0.0)])
            .expect("save should succeed");

        let active = manager.active_entries().expect("read should succeed");
        assert!(!active.contains_key("a"));
    }

    #[test]
    fn duplicate_keys_in_one_save_expected_last_wins() {
        let manager = manager();
        manager
            .save(&[payload("a", "first", 100.0), payload("a", "second", 100.0)])
            .expect("save should succeed");

        let active = manager.active_entries().expect("read should succeed");
        assert_eq!(active["a"].payload.value, "second");
    }

    #[test]
    fn duplicate_key_ending_in_deletion_expected_absent() {
        let manager = manager();
        manager
            .save(&[payload("a", "first", 100.0), payload("a", "", -1.0)])
            .expect("save should succeed");

        let active = manager.active_entries().expect("read should succeed");
        assert!(active.is_empty());
    }

    #[test]
    fn expired_entry_expected_excluded_and_evicted() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let manager = StoreManager::new(store.clone());
        manager
            .save(&[payload("short", "v", 0.02), payload("long", "v", 100.0)])
            .expect("save should succeed");

        std::thread::sleep(Duration::from_millis(40));

        let active = manager.active_entries().expect("read should succeed");
        assert!(!active.contains_key("short"));
        assert!(active.contains_key("long"));
        // eviction removed the stale key from the backing store as well
        assert_eq!(
            store.keys().expect("keys should succeed"),
            vec!["long".to_string()]
        );
    }

    #[test]
    fn overwrite_expected_last_write_wins() {
        let manager = manager();
        manager
            .save(&[payload("a", "old", 100.0)])
            .expect("save should succeed");
        manager
            .save(&[payload("a", "new", 100.0)])
            .expect("save should succeed");

        let payloads = manager.active_payloads().expect("read should succeed");
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].value, "new");
    }

    #[test]
    fn delete_all_expected_empty_store() {
        let manager = manager();
        manager
            .save(&[payload("a", "1", 100.0), payload("b", "2", 100.0)])
            .expect("save should succeed");
        manager.delete_all().expect("delete should succeed");

        assert!(manager
            .active_entries()
            .expect("read should succeed")
            .is_empty());
    }

    #[test]
    fn undecodable_backing_value_expected_evicted_not_surfaced() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set("junk", "not json".to_string())
            .expect("set should succeed");
        let manager = StoreManager::new(store.clone());

        let active = manager.active_entries().expect("read should succeed");
        assert!(active.is_empty());
        assert!(store.keys().expect("keys should succeed").is_empty());
    }
}
