use crate::domain::errors::StorageError;
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::DurableStore;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::channel::oneshot;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{IdbDatabase, IdbObjectStore, IdbOpenDbRequest, IdbRequest, IdbTransactionMode, IdbVersionChangeEvent};

const DB_VERSION: u32 = 1;

/// [`DurableStore`] backed by one IndexedDB object store holding JSON strings.
pub struct IndexedDbStore {
    database_name: String,
    store_name: String,
    db: RefCell<Option<IdbDatabase>>,
}

impl IndexedDbStore {
    pub fn new(database_name: &str, store_name: &str) -> Self {
        Self {
            database_name: database_name.to_string(),
            store_name: store_name.to_string(),
            db: RefCell::new(None),
        }
    }

    /// Whether the current global exposes `indexedDB` at all.
    pub fn is_available() -> bool {
        web_sys::window()
            .and_then(|window| window.indexed_db().ok().flatten())
            .is_some()
    }

    fn object_store(&self, mode: IdbTransactionMode) -> Result<IdbObjectStore, StorageError> {
        let db = self.db.borrow();
        let db = db.as_ref().ok_or(StorageError::NotInitialized)?;
        let transaction = db
            .transaction_with_str_and_mode(&self.store_name, mode)
            .map_err(|e| StorageError::ReadFailed(describe(&e)))?;
        transaction
            .object_store(&self.store_name)
            .map_err(|e| StorageError::ReadFailed(describe(&e)))
    }

    async fn open_database(&self) -> Result<(), StorageError> {
        let factory = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("window not available".to_string()))?
            .indexed_db()
            .map_err(|e| StorageError::Unavailable(describe(&e)))?
            .ok_or_else(|| StorageError::Unavailable("indexedDB not supported".to_string()))?;

        let open_request: IdbOpenDbRequest = factory
            .open_with_u32(&self.database_name, DB_VERSION)
            .map_err(|e| StorageError::OpenFailed(describe(&e)))?;

        let store_name = self.store_name.clone();
        let on_upgrade = Closure::<dyn FnMut(IdbVersionChangeEvent)>::new(move |event: IdbVersionChangeEvent| {
            let db = event
                .target()
                .and_then(|target| target.dyn_into::<IdbOpenDbRequest>().ok())
                .and_then(|request| request.result().ok())
                .and_then(|result| result.dyn_into::<IdbDatabase>().ok());
            if let Some(db) = db {
                if !db.object_store_names().contains(&store_name) {
                    if let Err(e) = db.create_object_store(&store_name) {
                        get_logger().error(
                            LogComponent::Infrastructure("IndexedDb"),
                            &format!("Failed to create object store '{}': {}", store_name, describe(&e)),
                        );
                    }
                }
            }
        });
        open_request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

        let result = await_request(&open_request).await;
        open_request.set_onupgradeneeded(None);
        drop(on_upgrade);
        let result = result.map_err(|e| StorageError::OpenFailed(describe(&e)))?;
        let db: IdbDatabase = result
            .dyn_into()
            .map_err(|e| StorageError::OpenFailed(describe(&e)))?;

        get_logger().info(
            LogComponent::Infrastructure("IndexedDb"),
            &format!("Opened '{}/{}'", self.database_name, self.store_name),
        );
        *self.db.borrow_mut() = Some(db);
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<(String, String)>, StorageError> {
        let store = self.object_store(IdbTransactionMode::Readonly)?;
        let keys_request = store
            .get_all_keys()
            .map_err(|e| StorageError::ReadFailed(describe(&e)))?;
        let values_request = store
            .get_all()
            .map_err(|e| StorageError::ReadFailed(describe(&e)))?;

        let keys = await_request(&keys_request)
            .await
            .map_err(|e| StorageError::ReadFailed(describe(&e)))?;
        let values = await_request(&values_request)
            .await
            .map_err(|e| StorageError::ReadFailed(describe(&e)))?;

        let keys = js_sys::Array::from(&keys);
        let values = js_sys::Array::from(&values);
        Ok(keys
            .iter()
            .zip(values.iter())
            .filter_map(|(key, value)| Some((key.as_string()?, value.as_string()?)))
            .collect())
    }

    async fn write(&self, request: Result<IdbRequest, JsValue>) -> Result<(), StorageError> {
        let request = request.map_err(|e| StorageError::WriteFailed(describe(&e)))?;
        await_request(&request)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::WriteFailed(describe(&e)))
    }
}

impl DurableStore for IndexedDbStore {
    fn open(&self) -> LocalBoxFuture<'_, Result<(), StorageError>> {
        self.open_database().boxed_local()
    }

    fn load_all(&self) -> LocalBoxFuture<'_, Result<Vec<(String, String)>, StorageError>> {
        self.read_all().boxed_local()
    }

    fn put<'a>(&'a self, key: &'a str, value: String) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            let store = self.object_store(IdbTransactionMode::Readwrite)?;
            self.write(store.put_with_key(&JsValue::from_str(&value), &JsValue::from_str(key)))
                .await
        }
        .boxed_local()
    }

    fn remove<'a>(&'a self, key: &'a str) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        async move {
            let store = self.object_store(IdbTransactionMode::Readwrite)?;
            self.write(store.delete(&JsValue::from_str(key))).await
        }
        .boxed_local()
    }

    fn clear(&self) -> LocalBoxFuture<'_, Result<(), StorageError>> {
        async move {
            let store = self.object_store(IdbTransactionMode::Readwrite)?;
            self.write(store.clear()).await
        }
        .boxed_local()
    }
}

type EventHandler = Closure<dyn FnMut(web_sys::Event)>;

/// Keeps a request's callbacks alive and detaches them when dropped, so
/// neither the fired nor the unfired handler outlives the request.
struct RequestHandlers {
    request: IdbRequest,
    _on_success: EventHandler,
    _on_error: EventHandler,
}

impl Drop for RequestHandlers {
    fn drop(&mut self) {
        self.request.set_onsuccess(None);
        self.request.set_onerror(None);
    }
}

/// Resolves once `request` fires `success`, fails on `error`.
async fn await_request(request: &IdbRequest) -> Result<JsValue, JsValue> {
    let (sender, receiver) = oneshot::channel::<Result<JsValue, JsValue>>();
    let sender = Rc::new(RefCell::new(Some(sender)));

    let success_sender = Rc::clone(&sender);
    let success_request = request.clone();
    let on_success = EventHandler::new(move |_event: web_sys::Event| {
        if let Some(sender) = success_sender.borrow_mut().take() {
            let _ = sender.send(Ok(success_request.result().unwrap_or(JsValue::UNDEFINED)));
        }
    });

    let error_request = request.clone();
    let on_error = EventHandler::new(move |_event: web_sys::Event| {
        let error = error_request
            .error()
            .ok()
            .flatten()
            .map(JsValue::from)
            .unwrap_or(JsValue::UNDEFINED);
        if let Some(sender) = sender.borrow_mut().take() {
            let _ = sender.send(Err(error));
        }
    });

    request.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
    request.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    let _handlers = RequestHandlers {
        request: request.clone(),
        _on_success: on_success,
        _on_error: on_error,
    };

    receiver
        .await
        .unwrap_or_else(|_| Err(JsValue::from_str("request callbacks dropped")))
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
