//! Contracts between the market-board core and its storage, network and
//! configuration collaborators.

use super::entities::{CachedEntry, PriceData};
use super::value_objects::{MarketConfig, MarketConfigUpdate};
use crate::domain::errors::{AppResult, NetworkError, StorageError};
use crate::domain::events::Subscription;
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::rc::Rc;

/// Pluggable key-value cache.
///
/// No operation fails towards the caller: implementations log storage errors
/// and degrade to a miss or a no-op.
pub trait CacheBackend<T> {
    fn get(&self, key: &str) -> Option<CachedEntry<T>>;

    /// Fire-and-forget write.
    fn set(&self, key: &str, value: CachedEntry<T>);

    fn delete(&self, key: &str);

    fn clear(&self);

    fn keys(&self) -> Vec<String>;

    /// Whether the backend finished its asynchronous setup.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Asynchronous durable string store (IndexedDB in the browser).
pub trait DurableStore {
    fn open(&self) -> LocalBoxFuture<'_, Result<(), StorageError>>;

    fn load_all(&self) -> LocalBoxFuture<'_, Result<Vec<(String, String)>, StorageError>>;

    fn put<'a>(&'a self, key: &'a str, value: String) -> LocalBoxFuture<'a, Result<(), StorageError>>;

    fn remove<'a>(&'a self, key: &'a str) -> LocalBoxFuture<'a, Result<(), StorageError>>;

    fn clear(&self) -> LocalBoxFuture<'_, Result<(), StorageError>>;
}

/// Synchronous string store with a small quota (`localStorage` in the browser).
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Upstream price provider: one batched request for a world or data center.
pub trait PriceProvider {
    fn fetch_prices<'a>(
        &'a self,
        item_ids: &'a [u32],
        scope: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<PriceData>, NetworkError>>;
}

/// Batched, cache-aware price source used by the market board.
pub trait MarketPriceSource {
    /// Fetches prices for `item_ids` on `server`, reporting `(current, total)`
    /// progress as results arrive.
    fn fetch_prices<'a>(
        &'a self,
        item_ids: &'a [u32],
        server: &'a str,
        on_progress: &'a dyn Fn(usize, usize),
    ) -> LocalBoxFuture<'a, AppResult<HashMap<u32, PriceData>>>;

    /// Purges every cached price so the next fetch goes to the network.
    fn clear_cache(&self);
}

/// Owner of the `"market"` configuration channel.
pub trait MarketConfigSource {
    fn market_config(&self) -> MarketConfig;

    /// Registers a listener for every `"market"` delivery.
    fn subscribe_market(&self, listener: Rc<dyn Fn(&MarketConfig)>) -> Subscription;

    fn set_market_config(&self, update: MarketConfigUpdate);
}

/// World id -> display name.
pub trait WorldLookup {
    fn world_name(&self, world_id: u32) -> Option<String>;
}
