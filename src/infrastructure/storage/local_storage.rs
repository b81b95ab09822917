use crate::domain::errors::StorageError;
use crate::domain::market_data::KeyValueStorage;
use gloo::storage::{LocalStorage, Storage};
use wasm_bindgen::{JsCast, JsValue};

/// [`KeyValueStorage`] over the browser's `localStorage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserLocalStorage;

impl BrowserLocalStorage {
    pub fn is_available() -> bool {
        web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .is_some()
    }
}

impl KeyValueStorage for BrowserLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        LocalStorage::raw()
            .get_item(key)
            .map_err(|e| StorageError::ReadFailed(describe(&e)))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        LocalStorage::raw().set_item(key, value).map_err(|e| {
            let is_quota = e
                .dyn_ref::<web_sys::DomException>()
                .is_some_and(|ex| ex.name() == "QuotaExceededError");
            if is_quota {
                StorageError::QuotaExceeded(describe(&e))
            } else {
                StorageError::WriteFailed(describe(&e))
            }
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        LocalStorage::raw()
            .remove_item(key)
            .map_err(|e| StorageError::WriteFailed(describe(&e)))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let raw = LocalStorage::raw();
        let length = raw
            .length()
            .map_err(|e| StorageError::ReadFailed(describe(&e)))?;
        Ok((0..length)
            .filter_map(|index| raw.key(index).ok().flatten())
            .collect())
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
