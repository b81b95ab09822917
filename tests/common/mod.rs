#![allow(dead_code)]

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use market_price_wasm::domain::errors::{AppError, AppResult, NetworkError, StorageError};
use market_price_wasm::domain::market_data::{DurableStore, MarketPriceSource, PriceData, PriceProvider};
use market_price_wasm::infrastructure::runtime::Sleeper;
use market_price_wasm::infrastructure::storage::MemoryStore;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

/// Sleeper that returns immediately and remembers what it was asked for.
#[derive(Default)]
pub struct InstantSleeper {
    pub waits: RefCell<Vec<Duration>>,
}

impl Sleeper for InstantSleeper {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        self.waits.borrow_mut().push(duration);
        async {}.boxed_local()
    }
}

/// [`MemoryStore`] with injectable failures and call counters.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub open_calls: Cell<u32>,
    pub fail_open: Cell<bool>,
    pub put_attempts: Cell<u32>,
    /// Number of upcoming `put` calls that fail.
    pub failing_puts: Cell<u32>,
}

impl FlakyStore {
    pub fn failing_puts(count: u32) -> Self {
        let store = Self::default();
        store.failing_puts.set(count);
        store
    }
}

impl DurableStore for FlakyStore {
    fn open(&self) -> LocalBoxFuture<'_, Result<(), StorageError>> {
        self.open_calls.set(self.open_calls.get() + 1);
        if self.fail_open.get() {
            return async { Err(StorageError::OpenFailed("blocked".to_string())) }.boxed_local();
        }
        self.inner.open()
    }

    fn load_all(&self) -> LocalBoxFuture<'_, Result<Vec<(String, String)>, StorageError>> {
        self.inner.load_all()
    }

    fn put<'a>(&'a self, key: &'a str, value: String) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        self.put_attempts.set(self.put_attempts.get() + 1);
        let remaining = self.failing_puts.get();
        if remaining > 0 {
            self.failing_puts.set(remaining - 1);
            return async { Err(StorageError::WriteFailed("disk full".to_string())) }.boxed_local();
        }
        self.inner.put(key, value)
    }

    fn remove<'a>(&'a self, key: &'a str) -> LocalBoxFuture<'a, Result<(), StorageError>> {
        self.inner.remove(key)
    }

    fn clear(&self) -> LocalBoxFuture<'_, Result<(), StorageError>> {
        self.inner.clear()
    }
}

/// Provider answering from a fixed price table and recording each request.
#[derive(Default)]
pub struct TableProvider {
    pub prices: RefCell<HashMap<u32, f64>>,
    pub requests: RefCell<Vec<(Vec<u32>, String)>>,
    pub fail: Cell<bool>,
}

impl TableProvider {
    pub fn with_prices(prices: &[(u32, f64)]) -> Self {
        let provider = Self::default();
        provider.prices.borrow_mut().extend(prices.iter().copied());
        provider
    }
}

impl PriceProvider for TableProvider {
    fn fetch_prices<'a>(
        &'a self,
        item_ids: &'a [u32],
        scope: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<PriceData>, NetworkError>> {
        self.requests
            .borrow_mut()
            .push((item_ids.to_vec(), scope.to_string()));
        let result = if self.fail.get() {
            Err(NetworkError::HttpStatus {
                status: 503,
                text: "Service Unavailable".to_string(),
            })
        } else {
            let table = self.prices.borrow();
            Ok(item_ids
                .iter()
                .filter_map(|id| table.get(id).map(|p| PriceData::new(*id, *p, *p, *p)))
                .collect())
        };
        async move { result }.boxed_local()
    }
}

/// Price source whose fetches stay pending until the test resolves them,
/// in any order.
#[derive(Default)]
pub struct ScriptedPrices {
    pending: RefCell<Vec<Option<oneshot::Sender<AppResult<HashMap<u32, PriceData>>>>>>,
    pub calls: RefCell<Vec<(Vec<u32>, String)>>,
    pub cache_clears: Cell<u32>,
}

impl ScriptedPrices {
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn resolve(&self, call: usize, prices: &[(u32, f64)]) {
        let map = prices
            .iter()
            .map(|(id, p)| (*id, PriceData::new(*id, *p, *p, *p)))
            .collect();
        self.send(call, Ok(map));
    }

    pub fn resolve_with(&self, call: usize, prices: Vec<PriceData>) {
        self.send(call, Ok(prices.into_iter().map(|p| (p.item_id, p)).collect()));
    }

    pub fn fail(&self, call: usize, error: NetworkError) {
        self.send(call, Err(AppError::from(error)));
    }

    fn send(&self, call: usize, result: AppResult<HashMap<u32, PriceData>>) {
        let sender = self.pending.borrow_mut()[call]
            .take()
            .expect("call already resolved");
        sender.send(result).expect("fetch dropped");
    }
}

impl MarketPriceSource for ScriptedPrices {
    fn fetch_prices<'a>(
        &'a self,
        item_ids: &'a [u32],
        server: &'a str,
        _on_progress: &'a dyn Fn(usize, usize),
    ) -> LocalBoxFuture<'a, AppResult<HashMap<u32, PriceData>>> {
        let (sender, receiver) = oneshot::channel();
        self.pending.borrow_mut().push(Some(sender));
        self.calls
            .borrow_mut()
            .push((item_ids.to_vec(), server.to_string()));
        async move {
            receiver.await.unwrap_or_else(|_| {
                Err(AppError::from(NetworkError::HttpRequestFailed(
                    "request abandoned".to_string(),
                )))
            })
        }
        .boxed_local()
    }

    fn clear_cache(&self) {
        self.cache_clears.set(self.cache_clears.get() + 1);
    }
}
