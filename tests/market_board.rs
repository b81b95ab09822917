mod common;

use common::{ScriptedPrices, TableProvider};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use market_price_wasm::application::{
    MarketBoardDeps, MarketBoardService, PRICE_CATEGORIES_KEY, PriceClient, PriceClientConfig,
};
use market_price_wasm::domain::errors::NetworkError;
use market_price_wasm::domain::events::{MarketEvent, MarketEventKind};
use market_price_wasm::domain::market_data::{
    CacheBackend, Dye, KeyValueStorage, MarketConfig, MarketConfigSource, MarketConfigUpdate, PriceCategory,
    PriceData,
};
use market_price_wasm::infrastructure::cache::SimpleCacheBackend;
use market_price_wasm::infrastructure::storage::MemoryKeyValueStorage;
use market_price_wasm::infrastructure::{ConfigController, WorldDirectory};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

struct Board {
    pool: LocalPool,
    prices: Rc<ScriptedPrices>,
    config: Rc<ConfigController>,
    storage: Rc<MemoryKeyValueStorage>,
    service: Rc<MarketBoardService>,
    events: Rc<RefCell<Vec<MarketEvent>>>,
    returned: Rc<RefCell<Vec<HashMap<u32, PriceData>>>>,
}

impl Board {
    fn new(show_prices: bool) -> Self {
        Self::with_storage(show_prices, Rc::new(MemoryKeyValueStorage::new()))
    }

    fn with_storage(show_prices: bool, storage: Rc<MemoryKeyValueStorage>) -> Self {
        let prices = Rc::new(ScriptedPrices::default());
        let config = Rc::new(ConfigController::new(MarketConfig::new("Crystal", show_prices)));
        let worlds: WorldDirectory = [(40, "Jenova".to_string())].into_iter().collect();
        let service = MarketBoardService::new(MarketBoardDeps {
            prices: prices.clone(),
            config: config.clone(),
            storage: storage.clone(),
            worlds: Rc::new(worlds),
        });

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        // Dropping a subscription keeps the listener registered.
        let _ = service
            .events()
            .subscribe_all(move |event| sink.borrow_mut().push(event.clone()));

        Self {
            pool: LocalPool::new(),
            prices,
            config,
            storage,
            service,
            events,
            returned: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Starts a fetch in the background and runs it up to its network call.
    fn start_fetch(&mut self, items: Vec<Dye>) {
        let service = Rc::clone(&self.service);
        let returned = Rc::clone(&self.returned);
        self.pool
            .spawner()
            .spawn_local(async move {
                let result = service.fetch_prices_for_dyes(&items, None).await;
                returned.borrow_mut().push(result);
            })
            .unwrap();
        self.pool.run_until_stalled();
    }

    fn kinds(&self) -> Vec<MarketEventKind> {
        self.events.borrow().iter().map(MarketEvent::kind).collect()
    }
}

fn crafted(item_id: u32) -> Dye {
    Dye::new(item_id, "Dalamud Red", "Red", Some("Crafting"))
}

#[test]
fn latest_started_fetch_wins_even_if_it_finishes_first() {
    let mut board = Board::new(true);

    board.start_fetch(vec![crafted(5729)]);
    board.start_fetch(vec![crafted(5729)]);
    assert_eq!(board.prices.call_count(), 2);
    assert_eq!(board.service.request_version(), 2);

    board.prices.resolve(1, &[(5729, 2000.0)]);
    board.pool.run_until_stalled();
    board.prices.resolve(0, &[(5729, 1000.0)]);
    board.pool.run_until_stalled();

    let price = board.service.get_price_for_dye(5729).unwrap();
    assert_eq!(price.current_average, 2000.0);
    assert!(!board.service.is_fetching());

    let returned = board.returned.borrow();
    assert_eq!(returned[0].len(), 1);
    assert!(returned[1].is_empty());
    assert!(board.events.borrow().contains(&MarketEvent::FetchCompleted {
        version: 1,
        applied: false
    }));
}

#[test]
fn superseded_fetch_leaves_is_fetching_to_the_latest() {
    let mut board = Board::new(true);

    board.start_fetch(vec![crafted(1)]);
    board.start_fetch(vec![crafted(1)]);
    board.prices.resolve(0, &[(1, 5.0)]);
    board.pool.run_until_stalled();
    assert!(board.service.is_fetching());

    board.prices.resolve(1, &[(1, 6.0)]);
    board.pool.run_until_stalled();
    assert!(!board.service.is_fetching());
}

#[test]
fn empty_or_filtered_input_never_reaches_the_network() {
    let mut board = Board::new(true);

    board.start_fetch(Vec::new());
    // Base dyes are disabled by default and specials need the special flag.
    board.start_fetch(vec![Dye::new(1, "Snow White", "White", Some("Dye Vendor"))]);
    board.start_fetch(vec![Dye::new(2, "Mystery", "Red", None)]);

    assert_eq!(board.prices.call_count(), 0);
    assert_eq!(board.service.request_version(), 0);
    assert!(board.returned.borrow().iter().all(HashMap::is_empty));
    assert!(board.events.borrow().is_empty());
}

#[test]
fn hidden_prices_short_circuit() {
    let mut board = Board::new(false);
    board.start_fetch(vec![crafted(1)]);
    assert_eq!(board.prices.call_count(), 0);
}

#[test]
fn fetch_events_are_published_in_order() {
    let mut board = Board::new(true);
    board.start_fetch(vec![crafted(1), crafted(2)]);
    board.prices.resolve(0, &[(1, 10.0)]);
    board.pool.run_until_stalled();

    assert_eq!(
        *board.events.borrow(),
        vec![
            MarketEvent::FetchStarted { version: 1, total: 2 },
            MarketEvent::PricesUpdated {
                version: 1,
                item_ids: vec![1]
            },
            MarketEvent::FetchCompleted {
                version: 1,
                applied: true
            },
        ]
    );
    assert_eq!(board.service.get_price_for_dye(2), None);
}

#[test]
fn network_failure_emits_error_and_returns_nothing() {
    let mut board = Board::new(true);
    board.start_fetch(vec![crafted(1)]);
    board.prices.fail(0, NetworkError::HttpRequestFailed("offline".to_string()));
    board.pool.run_until_stalled();

    assert!(board.returned.borrow()[0].is_empty());
    assert!(!board.service.is_fetching());
    assert_eq!(
        board.kinds(),
        vec![MarketEventKind::FetchStarted, MarketEventKind::FetchError]
    );
}

#[test]
fn server_change_clears_prices_and_discards_in_flight_results() {
    let mut board = Board::new(true);
    board.start_fetch(vec![crafted(1)]);
    board.prices.resolve(0, &[(1, 10.0)]);
    board.pool.run_until_stalled();
    assert!(board.service.get_price_for_dye(1).is_some());

    board.start_fetch(vec![crafted(1)]);
    board.service.set_selected_server("Aether");

    assert_eq!(board.service.selected_server(), "Aether");
    assert!(board.service.all_prices().is_empty());
    assert!(board.events.borrow().contains(&MarketEvent::ServerChanged {
        server: "Aether".to_string(),
        previous_server: "Crystal".to_string(),
    }));

    board.prices.resolve(1, &[(1, 99.0)]);
    board.pool.run_until_stalled();
    assert_eq!(board.service.get_price_for_dye(1), None);

    board.start_fetch(vec![crafted(1)]);
    assert_eq!(board.prices.calls.borrow()[2].1, "Aether");
}

#[test]
fn show_prices_toggle_is_announced_once() {
    let board = Board::new(false);
    board.service.set_show_prices(true);
    board.config.set_market_config(MarketConfigUpdate::show_prices(true));

    assert!(board.service.show_prices());
    assert_eq!(
        *board.events.borrow(),
        vec![MarketEvent::SettingsChanged { show_prices: true }]
    );
}

#[test]
fn refresh_clears_client_cache_and_local_prices() {
    let mut board = Board::new(true);
    board.start_fetch(vec![crafted(1)]);
    board.prices.resolve(0, &[(1, 10.0)]);
    board.pool.run_until_stalled();

    board.service.refresh_prices();

    assert_eq!(board.prices.cache_clears.get(), 1);
    assert_eq!(board.service.get_price_for_dye(1), None);
}

#[test]
fn destroy_detaches_from_config_and_is_idempotent() {
    let mut board = Board::new(true);
    board.start_fetch(vec![crafted(1)]);
    board.prices.resolve(0, &[(1, 10.0)]);
    board.pool.run_until_stalled();
    assert_eq!(board.config.subscriber_count(), 1);

    board.service.destroy();
    board.service.destroy();

    assert_eq!(board.config.subscriber_count(), 0);
    assert!(board.service.all_prices().is_empty());
    board.config.set_market_config(MarketConfigUpdate::server("Aether"));
    assert_eq!(board.service.selected_server(), "Crystal");
}

#[test]
fn world_names_fall_back_to_selected_server() {
    let board = Board::new(true);
    let listed = PriceData::new(1, 1.0, 1.0, 1.0).with_world(40);
    let unknown_world = PriceData::new(1, 1.0, 1.0, 1.0).with_world(99);
    let no_world = PriceData::new(1, 1.0, 1.0, 1.0);

    assert_eq!(board.service.get_world_name_for_price(Some(&listed)), "Jenova");
    assert_eq!(board.service.get_world_name_for_price(Some(&unknown_world)), "Crystal");
    assert_eq!(board.service.get_world_name_for_price(Some(&no_world)), "Crystal");
    assert_eq!(board.service.get_world_name_for_price(None), "Crystal");
}

#[test]
fn category_toggles_persist_and_drive_filtering() {
    let storage = Rc::new(MemoryKeyValueStorage::new());
    let mut board = Board::with_storage(true, storage.clone());

    board.service.set_price_category(PriceCategory::CraftDyes, false);
    board.start_fetch(vec![crafted(1)]);
    assert_eq!(board.prices.call_count(), 0);
    assert!(board.storage.get_item(PRICE_CATEGORIES_KEY).unwrap().is_some());
    assert_eq!(board.kinds(), vec![MarketEventKind::CategoriesChanged]);

    let reloaded = Board::with_storage(true, storage);
    assert!(!reloaded.service.price_categories().craft_dyes);
}

#[test]
fn panicking_listener_does_not_starve_others() {
    let mut board = Board::new(true);
    let _noisy = board
        .service
        .subscribe(MarketEventKind::FetchStarted, |_| panic!("listener bug"));
    let started = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&started);
    let _quiet = board.service.subscribe(MarketEventKind::FetchStarted, move |_| {
        *counter.borrow_mut() += 1;
    });

    board.start_fetch(vec![crafted(1)]);

    assert_eq!(*started.borrow(), 1);
    assert_eq!(board.prices.call_count(), 1);
}

#[test]
fn end_to_end_with_price_client() {
    let provider = Rc::new(TableProvider::with_prices(&[(5729, 1200.0)]));
    let fallback = Rc::new(MemoryKeyValueStorage::new());
    let client = Rc::new(PriceClient::new(
        Rc::new(SimpleCacheBackend::<PriceData>::new(fallback.clone())),
        provider.clone(),
        PriceClientConfig::default(),
    ));
    let config = Rc::new(ConfigController::new(MarketConfig::new("Crystal", true)));
    let service = MarketBoardService::new(MarketBoardDeps {
        prices: client.clone(),
        config,
        storage: Rc::new(MemoryKeyValueStorage::new()),
        worlds: Rc::new(WorldDirectory::new()),
    });
    let mut pool = LocalPool::new();
    let progress = RefCell::new(Vec::new());
    let record = |done: usize, total: usize| progress.borrow_mut().push((done, total));

    let fetched = pool.run_until(service.fetch_prices_for_dyes(&[crafted(5729), crafted(5730)], Some(&record)));

    assert_eq!(fetched.len(), 1);
    assert_eq!(service.get_price_for_dye(5729).map(|p| p.current_min_price), Some(1200.0));
    assert_eq!(*progress.borrow(), vec![(2, 2)]);
    assert_eq!(service.format_price(1_234_567.0), "1,234,567G");

    service.refresh_prices();
    let cache: SimpleCacheBackend<PriceData> = SimpleCacheBackend::new(fallback);
    assert!(cache.keys().is_empty());
}
