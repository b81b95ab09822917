use super::price_client::format_price;
use crate::domain::errors::StorageError;
use crate::domain::events::{EventBus, MarketEvent, MarketEventKind, Subscription};
use crate::domain::logging::{LogComponent, LogLevel, get_logger};
use crate::domain::market_data::{
    Dye, KeyValueStorage, MarketConfig, MarketConfigSource, MarketConfigUpdate, MarketPriceSource, PriceCategory,
    PriceCategorySettings, PriceData, WorldLookup, should_fetch_price,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub const PRICE_CATEGORIES_KEY: &str = "xivdyetools_price_categories";

/// Collaborators of a [`MarketBoardService`].
#[derive(Clone)]
pub struct MarketBoardDeps {
    pub prices: Rc<dyn MarketPriceSource>,
    pub config: Rc<dyn MarketConfigSource>,
    pub storage: Rc<dyn KeyValueStorage>,
    pub worlds: Rc<dyn WorldLookup>,
}

/// Keeps the last known good prices for the selected server.
///
/// Fetches are versioned: every batch takes the next request version and only
/// the batch holding the current version when it completes may touch the price
/// map. A server change also advances the version, so nothing fetched for the
/// old server can land afterwards.
pub struct MarketBoardService {
    prices: Rc<dyn MarketPriceSource>,
    config: Rc<dyn MarketConfigSource>,
    storage: Rc<dyn KeyValueStorage>,
    worlds: Rc<dyn WorldLookup>,
    events: EventBus,
    selected_server: RefCell<String>,
    show_prices: Cell<bool>,
    price_categories: Cell<PriceCategorySettings>,
    is_fetching: Cell<bool>,
    price_data: RefCell<HashMap<u32, PriceData>>,
    request_version: Cell<u64>,
    config_subscription: RefCell<Option<Subscription>>,
}

impl MarketBoardService {
    pub fn new(deps: MarketBoardDeps) -> Rc<Self> {
        let market = deps.config.market_config();
        let categories = load_categories(deps.storage.as_ref());

        let service = Rc::new(Self {
            prices: deps.prices,
            config: deps.config,
            storage: deps.storage,
            worlds: deps.worlds,
            events: EventBus::new(),
            selected_server: RefCell::new(market.selected_server),
            show_prices: Cell::new(market.show_prices),
            price_categories: Cell::new(categories),
            is_fetching: Cell::new(false),
            price_data: RefCell::new(HashMap::new()),
            request_version: Cell::new(0),
            config_subscription: RefCell::new(None),
        });

        let weak = Rc::downgrade(&service);
        let subscription = service.config.subscribe_market(Rc::new(move |config: &MarketConfig| {
            if let Some(service) = weak.upgrade() {
                service.apply_market_config(config);
            }
        }));
        *service.config_subscription.borrow_mut() = Some(subscription);

        get_logger().info(
            LogComponent::Application("MarketBoard"),
            &format!("Market board ready on {}", service.selected_server()),
        );
        service
    }

    fn apply_market_config(&self, config: &MarketConfig) {
        let previous_server = self.selected_server();
        if config.selected_server != previous_server {
            *self.selected_server.borrow_mut() = config.selected_server.clone();
            self.price_data.borrow_mut().clear();
            self.request_version.set(self.request_version.get() + 1);
            self.is_fetching.set(false);
            get_logger().info(
                LogComponent::Application("MarketBoard"),
                &format!("Server changed {previous_server} -> {}", config.selected_server),
            );
            self.events.publish(MarketEvent::ServerChanged {
                server: config.selected_server.clone(),
                previous_server,
            });
        }

        if config.show_prices != self.show_prices.get() {
            self.show_prices.set(config.show_prices);
            self.events.publish(MarketEvent::SettingsChanged {
                show_prices: config.show_prices,
            });
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe<F>(&self, kind: MarketEventKind, handler: F) -> Subscription
    where
        F: Fn(&MarketEvent) + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    pub fn should_fetch_price(&self, item: &Dye) -> bool {
        should_fetch_price(item, &self.price_categories.get())
    }

    /// Fetches prices for the enabled subset of `items` on the selected
    /// server and returns what this call fetched.
    ///
    /// Returns an empty map without touching the network when prices are
    /// hidden or no item qualifies, when the fetch fails, and when a newer
    /// fetch or a server change superseded this one while it was in flight.
    pub async fn fetch_prices_for_dyes(
        &self,
        items: &[Dye],
        on_progress: Option<&dyn Fn(usize, usize)>,
    ) -> HashMap<u32, PriceData> {
        if items.is_empty() || !self.show_prices.get() {
            return HashMap::new();
        }

        let settings = self.price_categories.get();
        let item_ids: Vec<u32> = items
            .iter()
            .filter(|item| should_fetch_price(item, &settings))
            .map(|item| item.item_id)
            .collect();
        if item_ids.is_empty() {
            return HashMap::new();
        }

        let version = self.request_version.get() + 1;
        self.request_version.set(version);
        self.is_fetching.set(true);
        let server = self.selected_server();
        get_logger().log_fields(
            LogLevel::Debug,
            LogComponent::Application("MarketBoard"),
            "Fetching prices",
            &[("version", &version), ("server", &server), ("items", &item_ids.len())],
        );
        self.events.publish(MarketEvent::FetchStarted {
            version,
            total: item_ids.len(),
        });

        let silent = |_: usize, _: usize| {};
        let progress = on_progress.unwrap_or(&silent);
        let result = self.prices.fetch_prices(&item_ids, &server, progress).await;

        match result {
            Ok(prices) => {
                let applied = version == self.request_version.get();
                if applied {
                    let mut updated: Vec<u32> = prices.keys().copied().collect();
                    updated.sort_unstable();
                    self.price_data
                        .borrow_mut()
                        .extend(prices.iter().map(|(id, price)| (*id, price.clone())));
                    self.is_fetching.set(false);
                    self.events.publish(MarketEvent::PricesUpdated {
                        version,
                        item_ids: updated,
                    });
                } else {
                    crate::log_debug!(
                        LogComponent::Application("MarketBoard"),
                        "Discarding fetch v{version}, current is v{}",
                        self.request_version.get()
                    );
                }
                self.events.publish(MarketEvent::FetchCompleted { version, applied });
                if applied { prices } else { HashMap::new() }
            }
            Err(e) => {
                if version == self.request_version.get() {
                    self.is_fetching.set(false);
                }
                crate::log_error!(
                    LogComponent::Application("MarketBoard"),
                    "Price fetch v{version} on {server} failed: {e}"
                );
                self.events.publish(MarketEvent::FetchError {
                    version,
                    message: e.to_string(),
                });
                HashMap::new()
            }
        }
    }

    pub fn clear_cache(&self) {
        self.price_data.borrow_mut().clear();
    }

    /// Drops both the client cache and the local prices so the next fetch
    /// goes to the network.
    pub fn refresh_prices(&self) {
        self.prices.clear_cache();
        self.clear_cache();
    }

    pub fn get_price_for_dye(&self, item_id: u32) -> Option<PriceData> {
        self.price_data.borrow().get(&item_id).cloned()
    }

    /// Display name of the world a price was listed on, or the selected
    /// server when that is unknown.
    pub fn get_world_name_for_price(&self, price: Option<&PriceData>) -> String {
        price
            .and_then(|price| price.world_id)
            .and_then(|world_id| self.worlds.world_name(world_id))
            .unwrap_or_else(|| self.selected_server())
    }

    pub fn selected_server(&self) -> String {
        self.selected_server.borrow().clone()
    }

    pub fn show_prices(&self) -> bool {
        self.show_prices.get()
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching.get()
    }

    pub fn request_version(&self) -> u64 {
        self.request_version.get()
    }

    pub fn all_prices(&self) -> HashMap<u32, PriceData> {
        self.price_data.borrow().clone()
    }

    pub fn price_categories(&self) -> PriceCategorySettings {
        self.price_categories.get()
    }

    pub fn set_price_category(&self, category: PriceCategory, enabled: bool) {
        let settings = self.price_categories.get().with(category, enabled);
        if settings == self.price_categories.get() {
            return;
        }
        self.price_categories.set(settings);

        let saved = serde_json::to_string(&settings)
            .map_err(StorageError::from)
            .and_then(|raw| self.storage.set_item(PRICE_CATEGORIES_KEY, &raw));
        if let Err(e) = saved {
            get_logger().warn(
                LogComponent::Application("MarketBoard"),
                &format!("Saving price categories failed: {e}"),
            );
        }
        self.events.publish(MarketEvent::CategoriesChanged { settings });
    }

    pub fn set_selected_server(&self, server: &str) {
        self.config.set_market_config(MarketConfigUpdate::server(server));
    }

    pub fn set_show_prices(&self, show_prices: bool) {
        self.config.set_market_config(MarketConfigUpdate::show_prices(show_prices));
    }

    pub fn format_price(&self, price: f64) -> String {
        format_price(price)
    }

    /// Stops listening to configuration and forgets every price.
    pub fn destroy(&self) {
        if let Some(mut subscription) = self.config_subscription.borrow_mut().take() {
            subscription.unsubscribe();
            crate::log_debug!(LogComponent::Application("MarketBoard"), "Market board destroyed");
        }
        self.price_data.borrow_mut().clear();
    }
}

fn load_categories(storage: &dyn KeyValueStorage) -> PriceCategorySettings {
    match storage.get_item(PRICE_CATEGORIES_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            get_logger().warn(
                LogComponent::Application("MarketBoard"),
                &format!("Ignoring unreadable price categories: {e}"),
            );
            PriceCategorySettings::default()
        }),
        Ok(None) => PriceCategorySettings::default(),
        Err(e) => {
            get_logger().warn(
                LogComponent::Application("MarketBoard"),
                &format!("Reading price categories failed: {e}"),
            );
            PriceCategorySettings::default()
        }
    }
}
