//! Storage adapters behind the `DurableStore` and `KeyValueStorage` contracts.

pub mod memory;

#[cfg(target_arch = "wasm32")]
pub mod indexed_db;
#[cfg(target_arch = "wasm32")]
pub mod local_storage;

pub use memory::{MemoryKeyValueStorage, MemoryStore};

#[cfg(target_arch = "wasm32")]
pub use indexed_db::IndexedDbStore;
#[cfg(target_arch = "wasm32")]
pub use local_storage::BrowserLocalStorage;
