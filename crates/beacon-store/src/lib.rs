pub mod entry;
pub mod fs;
pub mod manager;
pub mod memory;
pub mod store;

pub use entry::{StoreEntry, StorePayload};
pub use fs::FsKeyValueStore;
pub use manager::StoreManager;
pub use memory::MemoryKeyValueStore;
pub use store::{KeyValueStore, StoreError, StoreResult};
