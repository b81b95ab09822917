use crate::domain::errors::StorageError;
use crate::domain::market_data::{DurableStore, KeyValueStorage};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// In-process [`DurableStore`], used off-browser.
#[derive(Debug, Default)]
pub struct MemoryStore {
    opened: Cell<bool>,
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with raw serialized entries.
    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            opened: Cell::new(false),
            entries: RefCell::new(entries.into_iter().collect()),
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.opened.get() {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }
}

impl DurableStore for MemoryStore {
    fn open(&self) -> LocalBoxFuture<'_, Result<(), StorageError>> {
        self.opened.set(true);
        async { Ok(()) }.boxed_local()
    }

    fn load_all(&self) -> LocalBoxFuture<'_, Result<Vec<(String, String)>, StorageError>> {
        let result = self.ensure_open().map(|_| {
            self.entries
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        });
        async move { result }.boxed_local()
    }

    fn put<'a>(&'a self, key: &'a str, value: String) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        let result = self.ensure_open().map(|_| {
            self.entries.borrow_mut().insert(key.to_string(), value);
        });
        async move { result }.boxed_local()
    }

    fn remove<'a>(&'a self, key: &'a str) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        let result = self.ensure_open().map(|_| {
            self.entries.borrow_mut().remove(key);
        });
        async move { result }.boxed_local()
    }

    fn clear(&self) -> LocalBoxFuture<'_, Result<(), StorageError>> {
        let result = self.ensure_open().map(|_| self.entries.borrow_mut().clear());
        async move { result }.boxed_local()
    }
}

/// In-process [`KeyValueStorage`] with an optional byte quota, mirroring the
/// few-megabyte limit of `localStorage`.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStorage {
    entries: RefCell<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKeyValueStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStorage for MemoryKeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let replaced = self
                .entries
                .borrow()
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or(0);
            let projected = self.used_bytes() - replaced + key.len() + value.len();
            if projected > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "{projected} bytes exceeds quota of {quota}"
                )));
            }
        }
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn durable_store_rejects_writes_before_open() {
        let store = MemoryStore::new();
        assert_eq!(
            block_on(store.put("k", "v".into())),
            Err(StorageError::NotInitialized)
        );
        block_on(store.open()).unwrap();
        block_on(store.put("k", "v".into())).unwrap();
        assert_eq!(store.raw("k").as_deref(), Some("v"));
    }

    #[test]
    fn quota_counts_replaced_values_once() {
        let storage = MemoryKeyValueStorage::with_quota(10);
        storage.set_item("ab", "12345678").unwrap();
        storage.set_item("ab", "87654321").unwrap();
        assert!(matches!(
            storage.set_item("c", "x"),
            Err(StorageError::QuotaExceeded(_))
        ));
        assert_eq!(storage.used_bytes(), 10);
    }
}
