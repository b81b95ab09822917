use crate::domain::errors::ConfigurationError;
use crate::domain::market_data::WorldLookup;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct WorldRecord {
    id: u32,
    name: String,
}

/// World id -> display name table.
#[derive(Debug, Clone, Default)]
pub struct WorldDirectory {
    names: HashMap<u32, String>,
}

impl WorldDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a `[{"id": 40, "name": "Jenova"}, ...]` list.
    pub fn from_json(raw: &str) -> Result<Self, ConfigurationError> {
        let records: Vec<WorldRecord> = serde_json::from_str(raw)
            .map_err(|e| ConfigurationError::InvalidParameter(format!("world list: {e}")))?;
        Ok(records
            .into_iter()
            .map(|record| (record.id, record.name))
            .collect())
    }

    pub fn insert(&mut self, world_id: u32, name: &str) {
        self.names.insert(world_id, name.to_string());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(u32, String)> for WorldDirectory {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl WorldLookup for WorldDirectory {
    fn world_name(&self, world_id: u32) -> Option<String> {
        self.names.get(&world_id).cloned()
    }
}
