use crate::domain::errors::StorageError;
use crate::domain::events::{ListenerSet, Subscription};
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::market_data::{KeyValueStorage, MarketConfig, MarketConfigSource, MarketConfigUpdate};
use std::cell::RefCell;
use std::rc::Rc;

pub const MARKET_CONFIG_KEY: &str = "xivdyetools_market_config";

/// In-process owner of the `"market"` configuration channel.
///
/// Subscribers receive the current value immediately and then every change.
/// With a storage attached, changes are written through and the last saved
/// value is restored on construction.
pub struct ConfigController {
    market: RefCell<MarketConfig>,
    listeners: ListenerSet<MarketConfig>,
    storage: Option<Rc<dyn KeyValueStorage>>,
}

impl Default for ConfigController {
    fn default() -> Self {
        Self::new(MarketConfig::default())
    }
}

impl ConfigController {
    pub fn new(initial: MarketConfig) -> Self {
        Self {
            market: RefCell::new(initial),
            listeners: ListenerSet::new("market"),
            storage: None,
        }
    }

    /// Controller backed by `storage`, falling back to defaults when nothing
    /// (or nothing readable) was saved.
    pub fn with_storage(storage: Rc<dyn KeyValueStorage>) -> Self {
        let restored = match storage.get_item(MARKET_CONFIG_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                get_logger().warn(
                    LogComponent::Infrastructure("Config"),
                    &format!("Ignoring unreadable market config: {e}"),
                );
                MarketConfig::default()
            }),
            Ok(None) => MarketConfig::default(),
            Err(e) => {
                get_logger().warn(
                    LogComponent::Infrastructure("Config"),
                    &format!("Reading market config failed: {e}"),
                );
                MarketConfig::default()
            }
        };

        Self {
            storage: Some(storage),
            ..Self::new(restored)
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn persist(&self, config: &MarketConfig) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = serde_json::to_string(config)
            .map_err(StorageError::from)
            .and_then(|raw| storage.set_item(MARKET_CONFIG_KEY, &raw));
        if let Err(e) = result {
            get_logger().warn(
                LogComponent::Infrastructure("Config"),
                &format!("Saving market config failed: {e}"),
            );
        }
    }
}

impl MarketConfigSource for ConfigController {
    fn market_config(&self) -> MarketConfig {
        self.market.borrow().clone()
    }

    fn subscribe_market(&self, listener: Rc<dyn Fn(&MarketConfig)>) -> Subscription {
        let subscription = self.listeners.subscribe(Rc::clone(&listener));
        let current = self.market_config();
        listener(&current);
        subscription
    }

    fn set_market_config(&self, update: MarketConfigUpdate) {
        let next = self.market.borrow().merged(&update);
        if next == *self.market.borrow() {
            return;
        }
        *self.market.borrow_mut() = next.clone();
        self.persist(&next);
        self.listeners.notify(&next);
    }
}
