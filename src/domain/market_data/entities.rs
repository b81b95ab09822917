use serde::{Deserialize, Serialize};

/// Market price snapshot for one item, as produced by the price provider.
///
/// Entries are never patched in place: a refetch replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    #[serde(rename = "itemID")]
    pub item_id: u32,
    pub current_average: f64,
    pub current_min_price: f64,
    pub current_max_price: f64,
    /// Milliseconds since the Unix epoch.
    pub last_update: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
}

impl PriceData {
    pub fn new(item_id: u32, current_average: f64, current_min_price: f64, current_max_price: f64) -> Self {
        Self {
            item_id,
            current_average,
            current_min_price,
            current_max_price,
            last_update: 0,
            world_id: None,
            world_name: None,
        }
    }

    pub fn with_world(mut self, world_id: u32) -> Self {
        self.world_id = Some(world_id);
        self
    }

    pub fn with_last_update(mut self, last_update: u64) -> Self {
        self.last_update = last_update;
        self
    }
}

/// Cached value together with the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry<T> {
    pub data: T,
    pub timestamp: u64,
}

impl<T> CachedEntry<T> {
    pub fn new(data: T, timestamp: u64) -> Self {
        Self { data, timestamp }
    }

    /// Wraps `data` with the current time from the installed time provider.
    pub fn now(data: T) -> Self {
        let timestamp = crate::domain::logging::get_time_provider().current_timestamp();
        Self { data, timestamp }
    }
}

/// Catalog item whose market price may be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dye {
    #[serde(rename = "itemID")]
    pub item_id: u32,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition: Option<String>,
}

impl Dye {
    pub fn new(item_id: u32, name: &str, category: &str, acquisition: Option<&str>) -> Self {
        Self {
            item_id,
            name: name.to_string(),
            category: category.to_string(),
            acquisition: acquisition.map(str::to_string),
        }
    }
}
