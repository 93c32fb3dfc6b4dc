use crate::memory::{MemoryKeyValueStore, MemoryState};
use crate::store::{KeyValueStore, StoreError, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};

const STATE_FILE_NAME: &str = "beacon-store-state.json";

/// File-backed key/value store: an in-memory store whose state is persisted
/// as a JSON file after every mutation.
#[derive(Clone, Debug)]
pub struct FsKeyValueStore {
    state_file: PathBuf,
    inner: MemoryKeyValueStore,
}

impl FsKeyValueStore {
    pub fn new<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        fs::create_dir_all(root.as_ref())
            .map_err(|err| StoreError::Backend(format!("create fs store root failed: {err}")))?;
        let state_file = root.as_ref().join(STATE_FILE_NAME);
        let state = if state_file.exists() {
            let raw = fs::read(&state_file)
                .map_err(|err| StoreError::Backend(format!("read state file failed: {err}")))?;
            serde_json::from_slice::<MemoryState>(&raw)
                .map_err(|err| StoreError::Serialization(err.to_string()))?
        } else {
            MemoryState::default()
        };

        Ok(Self {
            state_file,
            inner: MemoryKeyValueStore::from_state(state),
        })
    }

    fn persist(&self) -> StoreResult<()> {
        let snapshot = self.inner.snapshot()?;
        let raw = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|err| StoreError::Backend(format!("write state file failed: {err}")))?;
        fs::rename(&tmp, &self.state_file)
            .map_err(|err| StoreError::Backend(format!("rename state file failed: {err}")))?;
        Ok(())
    }
}

impl KeyValueStore for FsKeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.inner.set(key, value)?;
        self.persist()
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key)?;
        self.persist()
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_survives_reopen() {
        let root = tempfile::tempdir().expect("tempdir should be created");
        {
            let store = FsKeyValueStore::new(root.path()).expect("store should open");
            store.set("a", "1".to_string()).expect("set should succeed");
        }
        let reopened = FsKeyValueStore::new(root.path()).expect("store should reopen");
        assert_eq!(
            reopened.get("a").expect("get should succeed").as_deref(),
            Some("1")
        );
    }

    #[test]
    fn remove_is_persisted() {
        let root = tempfile::tempdir().expect("tempdir should be created");
        {
            let store = FsKeyValueStore::new(root.path()).expect("store should open");
            store.set("a", "1".to_string()).expect("set should succeed");
            store.remove("a").expect("remove should succeed");
        }
        let reopened = FsKeyValueStore::new(root.path()).expect("store should reopen");
        assert_eq!(reopened.get("a").expect("get should succeed"), None);
    }
}
