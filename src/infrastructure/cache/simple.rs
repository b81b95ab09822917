use crate::domain::errors::StorageError;
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::{CacheBackend, CachedEntry, KeyValueStorage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::rc::Rc;

pub const DEFAULT_KEY_PREFIX: &str = "xivdyetools_api_";

/// Only the write time of a stored entry, used to pick an eviction victim.
#[derive(Deserialize)]
struct Stamp {
    timestamp: u64,
}

/// Synchronous cache over a small-quota key-value store.
///
/// Keys are namespaced with a prefix so foreign entries sharing the store are
/// never read, listed or removed.
pub struct SimpleCacheBackend<T> {
    storage: Rc<dyn KeyValueStorage>,
    prefix: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SimpleCacheBackend<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(storage: Rc<dyn KeyValueStorage>) -> Self {
        Self::with_prefix(storage, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(storage: Rc<dyn KeyValueStorage>, prefix: &str) -> Self {
        Self {
            storage,
            prefix: prefix.to_string(),
            _marker: PhantomData,
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn prefixed_keys(&self) -> Vec<String> {
        match self.storage.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|key| key.starts_with(&self.prefix))
                .collect(),
            Err(e) => {
                warn(&format!("Listing keys failed: {e}"));
                Vec::new()
            }
        }
    }

    /// Removes the oldest entry of this namespace, other than `keep`.
    fn evict_oldest(&self, keep: &str) -> bool {
        let oldest = self
            .prefixed_keys()
            .into_iter()
            .filter(|key| key != keep)
            .filter_map(|key| {
                let raw = self.storage.get_item(&key).ok().flatten()?;
                let stamp = serde_json::from_str::<Stamp>(&raw).map(|s| s.timestamp).unwrap_or(0);
                Some((stamp, key))
            })
            .min();

        match oldest {
            Some((_, key)) => self.storage.remove_item(&key).is_ok(),
            None => false,
        }
    }

    fn write(&self, storage_key: &str, payload: &str) -> Result<(), StorageError> {
        match self.storage.set_item(storage_key, payload) {
            Err(StorageError::QuotaExceeded(reason)) => {
                get_logger().warn(
                    LogComponent::Infrastructure("SimpleCache"),
                    &format!("Quota exceeded writing '{storage_key}' ({reason}); evicting oldest entry"),
                );
                if self.evict_oldest(storage_key) {
                    self.storage.set_item(storage_key, payload)
                } else {
                    Err(StorageError::QuotaExceeded(reason))
                }
            }
            other => other,
        }
    }
}

impl<T> CacheBackend<T> for SimpleCacheBackend<T>
where
    T: Serialize + DeserializeOwned,
{
    fn get(&self, key: &str) -> Option<CachedEntry<T>> {
        let raw = match self.storage.get_item(&self.storage_key(key)) {
            Ok(raw) => raw?,
            Err(e) => {
                warn(&format!("Reading '{key}' failed: {e}"));
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn(&format!("Discarding unreadable '{key}': {e}"));
                None
            }
        }
    }

    fn set(&self, key: &str, value: CachedEntry<T>) {
        let result = serde_json::to_string(&value)
            .map_err(StorageError::from)
            .and_then(|payload| self.write(&self.storage_key(key), &payload));
        if let Err(e) = result {
            warn(&format!("Dropping write for '{key}': {e}"));
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(&self.storage_key(key)) {
            warn(&format!("Deleting '{key}' failed: {e}"));
        }
    }

    fn clear(&self) {
        for key in self.prefixed_keys() {
            if let Err(e) = self.storage.remove_item(&key) {
                warn(&format!("Clearing '{key}' failed: {e}"));
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        self.prefixed_keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_string))
            .collect()
    }
}

fn warn(message: &str) {
    get_logger().warn(LogComponent::Infrastructure("SimpleCache"), message);
}
