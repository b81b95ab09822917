use market_price_wasm::domain::market_data::{CacheBackend, CachedEntry, KeyValueStorage};
use market_price_wasm::infrastructure::cache::SimpleCacheBackend;
use market_price_wasm::infrastructure::storage::MemoryKeyValueStorage;
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

fn entry(data: u32, timestamp: u64) -> CachedEntry<u32> {
    CachedEntry::new(data, timestamp)
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn round_trips_entries_by_logical_key() {
    let cache: SimpleCacheBackend<u32> = SimpleCacheBackend::new(Rc::new(MemoryKeyValueStorage::new()));

    cache.set("a", entry(1, 10));
    cache.set("b", entry(2, 20));
    cache.delete("a");

    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(entry(2, 20)));
    assert_eq!(cache.keys(), vec!["b".to_string()]);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn quota_pressure_evicts_the_oldest_entry() {
    // Each entry takes 41 bytes: a 17 byte key and a 24 byte payload.
    let storage = Rc::new(MemoryKeyValueStorage::with_quota(100));
    let cache: SimpleCacheBackend<u32> = SimpleCacheBackend::new(storage.clone());

    cache.set("b", entry(2, 2));
    cache.set("a", entry(1, 1));
    cache.set("c", entry(3, 3));

    let mut keys = cache.keys();
    keys.sort();
    assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(cache.get("c"), Some(entry(3, 3)));
    assert!(storage.used_bytes() <= 100);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn write_is_dropped_when_nothing_of_ours_can_be_evicted() {
    let storage = Rc::new(MemoryKeyValueStorage::with_quota(50));
    storage
        .set_item("theme", "0123456789012345678901234567890123456789")
        .unwrap();
    let cache: SimpleCacheBackend<u32> = SimpleCacheBackend::new(storage.clone());

    cache.set("a", entry(1, 1));

    assert_eq!(cache.get("a"), None);
    assert!(storage.get_item("theme").unwrap().is_some());
}
