use super::config::PriceClientConfig;
use crate::domain::errors::{AppError, AppResult, NetworkError};
use crate::domain::logging::{LogComponent, get_logger, get_time_provider};
use crate::domain::market_data::{
    CacheBackend, CachedEntry, DurableStore, KeyValueStorage, MarketPriceSource, PriceData, PriceProvider,
};
use crate::infrastructure::cache::{PersistentCacheBackend, SimpleCacheBackend};
use crate::infrastructure::runtime::{Sleeper, TaskSpawner};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Builds the upstream provider for a resolved base URL.
pub type ProviderFactory = Rc<dyn Fn(&str) -> Rc<dyn PriceProvider>>;

/// Platform services a [`PriceClient`] is assembled from.
#[derive(Clone)]
pub struct ClientEnvironment {
    /// `None` when the platform has no durable store.
    pub durable_store: Option<Rc<dyn DurableStore>>,
    pub fallback_storage: Rc<dyn KeyValueStorage>,
    pub sleeper: Rc<dyn Sleeper>,
    pub spawner: Rc<dyn TaskSpawner>,
    pub provider: ProviderFactory,
}

/// Cache-aware facade over the upstream price provider.
pub struct PriceClient {
    cache: Rc<dyn CacheBackend<PriceData>>,
    provider: Rc<dyn PriceProvider>,
    config: PriceClientConfig,
    base_url: String,
}

impl PriceClient {
    pub fn new(
        cache: Rc<dyn CacheBackend<PriceData>>,
        provider: Rc<dyn PriceProvider>,
        config: PriceClientConfig,
    ) -> Self {
        let base_url = config.resolved_base_url();
        Self {
            cache,
            provider,
            config,
            base_url,
        }
    }

    /// Wires the persistent cache (or the key-value fallback when no durable
    /// store exists) and starts cache initialization in the background.
    pub fn build(config: &PriceClientConfig, env: &ClientEnvironment) -> Rc<Self> {
        let config = config.clone().sanitized();
        let base_url = config.resolved_base_url();
        let cache: Rc<dyn CacheBackend<PriceData>> = match &env.durable_store {
            Some(store) => {
                let backend = PersistentCacheBackend::new(
                    Rc::clone(store),
                    Rc::clone(&env.sleeper),
                    Rc::clone(&env.spawner),
                    config.retry,
                );
                let initialization = backend.initialize();
                env.spawner.spawn(
                    async move {
                        // Failures are logged by the backend and stay memoized.
                        let _ = initialization.await;
                    }
                    .boxed_local(),
                );
                Rc::new(backend)
            }
            None => {
                get_logger().warn(
                    LogComponent::Application("PriceClient"),
                    "Durable storage unavailable, using key-value fallback cache",
                );
                Rc::new(SimpleCacheBackend::with_prefix(
                    Rc::clone(&env.fallback_storage),
                    &config.key_prefix,
                ))
            }
        };

        get_logger().info(
            LogComponent::Application("PriceClient"),
            &format!("Price client ready against {base_url}"),
        );
        let provider = (env.provider)(&base_url);
        Rc::new(Self::new(cache, provider, config))
    }

    pub fn cache_key(item_id: u32, scope: &str) -> String {
        format!("{item_id}_{scope}")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &PriceClientConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.cache.is_ready()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        get_logger().info(LogComponent::Application("PriceClient"), "Price cache cleared");
    }

    fn fresh_entry(&self, key: &str, now: u64) -> Option<PriceData> {
        self.cache
            .get(key)
            .filter(|entry| self.config.freshness.is_fresh(entry.timestamp, now))
            .map(|entry| entry.data)
    }

    fn store(&self, scope: &str, price: &PriceData) {
        self.cache.set(
            &Self::cache_key(price.item_id, scope),
            CachedEntry::now(price.clone()),
        );
    }

    /// Price of one item, scoped to a world, else a data center, else the
    /// configured default data center. Network failures are logged and read
    /// as `None`.
    pub async fn get_price_data(
        &self,
        item_id: u32,
        world_id: Option<u32>,
        data_center_id: Option<&str>,
    ) -> Option<PriceData> {
        let scope = match (world_id, data_center_id) {
            (Some(world_id), _) => world_id.to_string(),
            (None, Some(data_center)) => data_center.to_string(),
            (None, None) => self.config.default_data_center.clone(),
        };

        let now = get_time_provider().current_timestamp();
        if let Some(hit) = self.fresh_entry(&Self::cache_key(item_id, &scope), now) {
            return Some(hit);
        }

        match self.provider.fetch_prices(&[item_id], &scope).await {
            Ok(prices) => {
                let price = prices.into_iter().find(|p| p.item_id == item_id)?;
                self.store(&scope, &price);
                Some(price)
            }
            Err(e) => {
                get_logger().error(
                    LogComponent::Application("PriceClient"),
                    &format!("Price lookup for {item_id} on {scope} failed: {e}"),
                );
                None
            }
        }
    }

    /// Prices for many items on one scope.
    ///
    /// Fresh cache hits are answered locally; the rest is requested in chunks
    /// of `chunk_size`. `on_progress(done, total)` fires once after the cache
    /// pass when it produced hits, then after every chunk. Items the provider
    /// has no listing for are absent from the result.
    pub async fn get_prices_for_items(
        &self,
        item_ids: &[u32],
        scope: &str,
        on_progress: &dyn Fn(usize, usize),
    ) -> Result<HashMap<u32, PriceData>, NetworkError> {
        let mut seen = HashSet::new();
        let unique: Vec<u32> = item_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let total = unique.len();

        let now = get_time_provider().current_timestamp();
        let mut results = HashMap::with_capacity(total);
        let mut misses = Vec::new();
        for item_id in unique {
            match self.fresh_entry(&Self::cache_key(item_id, scope), now) {
                Some(hit) => {
                    results.insert(item_id, hit);
                }
                None => misses.push(item_id),
            }
        }

        let mut done = results.len();
        if done > 0 {
            on_progress(done, total);
        }

        for chunk in misses.chunks(self.config.chunk_size.max(1)) {
            let prices = self.provider.fetch_prices(chunk, scope).await?;
            for price in prices {
                self.store(scope, &price);
                results.insert(price.item_id, price);
            }
            done += chunk.len();
            on_progress(done, total);
        }

        get_logger().debug(
            LogComponent::Application("PriceClient"),
            &format!(
                "{} prices on {scope}: {} cached, {} requested",
                results.len(),
                total - misses.len(),
                misses.len()
            ),
        );
        Ok(results)
    }
}

impl MarketPriceSource for PriceClient {
    fn fetch_prices<'a>(
        &'a self,
        item_ids: &'a [u32],
        server: &'a str,
        on_progress: &'a dyn Fn(usize, usize),
    ) -> LocalBoxFuture<'a, AppResult<HashMap<u32, PriceData>>> {
        async move {
            self.get_prices_for_items(item_ids, server, on_progress)
                .await
                .map_err(AppError::from)
        }
        .boxed_local()
    }

    fn clear_cache(&self) {
        PriceClient::clear_cache(self);
    }
}

/// Owner of the shared [`PriceClient`].
///
/// The client is built on first use by the injected factory and kept until
/// [`reset_instance`](Self::reset_instance).
pub struct PriceClientRegistry {
    factory: Box<dyn Fn() -> Rc<PriceClient>>,
    instance: RefCell<Option<Rc<PriceClient>>>,
}

impl PriceClientRegistry {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Rc<PriceClient> + 'static,
    {
        Self {
            factory: Box::new(factory),
            instance: RefCell::new(None),
        }
    }

    pub fn from_environment(config: PriceClientConfig, env: ClientEnvironment) -> Self {
        Self::new(move || PriceClient::build(&config, &env))
    }

    /// Registry wired to IndexedDB, `localStorage`, browser timers and the
    /// Universalis API.
    #[cfg(target_arch = "wasm32")]
    pub fn browser(config: PriceClientConfig) -> Self {
        use crate::infrastructure::http::UniversalisClient;
        use crate::infrastructure::runtime::{GlooSleeper, WasmSpawner};
        use crate::infrastructure::storage::{BrowserLocalStorage, IndexedDbStore};

        let durable_store = IndexedDbStore::is_available().then(|| {
            Rc::new(IndexedDbStore::new(&config.database_name, &config.store_name)) as Rc<dyn DurableStore>
        });
        let env = ClientEnvironment {
            durable_store,
            fallback_storage: Rc::new(BrowserLocalStorage),
            sleeper: Rc::new(GlooSleeper),
            spawner: Rc::new(WasmSpawner),
            provider: Rc::new(|base_url: &str| Rc::new(UniversalisClient::new(base_url)) as Rc<dyn PriceProvider>),
        };
        Self::from_environment(config, env)
    }

    pub fn get_instance(&self) -> Rc<PriceClient> {
        if let Some(client) = self.instance.borrow().as_ref() {
            return Rc::clone(client);
        }
        let client = (self.factory)();
        *self.instance.borrow_mut() = Some(Rc::clone(&client));
        client
    }

    pub fn reset_instance(&self) {
        self.instance.borrow_mut().take();
    }

    pub fn has_instance(&self) -> bool {
        self.instance.borrow().is_some()
    }
}

/// `1234567.0` -> `"1,234,567G"`; fractions are rounded to whole gil.
pub fn format_price(price: f64) -> String {
    let rounded = price.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}G")
}
