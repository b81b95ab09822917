//! [`CacheBackend`](crate::domain::market_data::CacheBackend) implementations.

pub mod persistent;
pub mod simple;

pub use persistent::PersistentCacheBackend;
pub use simple::{DEFAULT_KEY_PREFIX, SimpleCacheBackend};
