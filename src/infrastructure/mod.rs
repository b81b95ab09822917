//! Adapters for storage, network, scheduling and the browser runtime.

pub mod cache;
pub mod config_store;
pub mod http;
pub mod runtime;
pub mod storage;
pub mod world_directory;

#[cfg(target_arch = "wasm32")]
pub mod services;

pub use config_store::ConfigController;
pub use world_directory::WorldDirectory;
