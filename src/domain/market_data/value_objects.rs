use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Data center selected when nothing has been configured yet.
pub const DEFAULT_SERVER: &str = "Crystal";

/// Value Object - price category, keyed by how an item is acquired
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum PriceCategory {
    #[display(fmt = "baseDyes")]
    BaseDyes,
    #[display(fmt = "craftDyes")]
    CraftDyes,
    #[display(fmt = "alliedSocietyDyes")]
    AlliedSocietyDyes,
    #[display(fmt = "cosmicDyes")]
    CosmicDyes,
    #[display(fmt = "specialDyes")]
    SpecialDyes,
}

/// Value Object - which price categories are worth fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceCategorySettings {
    pub base_dyes: bool,
    pub craft_dyes: bool,
    pub allied_society_dyes: bool,
    pub cosmic_dyes: bool,
    pub special_dyes: bool,
}

impl Default for PriceCategorySettings {
    fn default() -> Self {
        Self {
            base_dyes: false,
            craft_dyes: true,
            allied_society_dyes: true,
            cosmic_dyes: true,
            special_dyes: true,
        }
    }
}

impl PriceCategorySettings {
    /// Every category disabled.
    pub fn none() -> Self {
        Self {
            base_dyes: false,
            craft_dyes: false,
            allied_society_dyes: false,
            cosmic_dyes: false,
            special_dyes: false,
        }
    }

    pub fn is_enabled(&self, category: PriceCategory) -> bool {
        match category {
            PriceCategory::BaseDyes => self.base_dyes,
            PriceCategory::CraftDyes => self.craft_dyes,
            PriceCategory::AlliedSocietyDyes => self.allied_society_dyes,
            PriceCategory::CosmicDyes => self.cosmic_dyes,
            PriceCategory::SpecialDyes => self.special_dyes,
        }
    }

    pub fn set(&mut self, category: PriceCategory, enabled: bool) {
        let flag = match category {
            PriceCategory::BaseDyes => &mut self.base_dyes,
            PriceCategory::CraftDyes => &mut self.craft_dyes,
            PriceCategory::AlliedSocietyDyes => &mut self.allied_society_dyes,
            PriceCategory::CosmicDyes => &mut self.cosmic_dyes,
            PriceCategory::SpecialDyes => &mut self.special_dyes,
        };
        *flag = enabled;
    }

    pub fn with(mut self, category: PriceCategory, enabled: bool) -> Self {
        self.set(category, enabled);
        self
    }
}

/// Value Object - the `"market"` configuration channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketConfig {
    pub selected_server: String,
    pub show_prices: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            selected_server: DEFAULT_SERVER.to_string(),
            show_prices: false,
        }
    }
}

impl MarketConfig {
    pub fn new(selected_server: &str, show_prices: bool) -> Self {
        Self {
            selected_server: selected_server.to_string(),
            show_prices,
        }
    }

    /// Applies a partial update, leaving absent fields untouched.
    pub fn merged(&self, update: &MarketConfigUpdate) -> Self {
        Self {
            selected_server: update
                .selected_server
                .clone()
                .unwrap_or_else(|| self.selected_server.clone()),
            show_prices: update.show_prices.unwrap_or(self.show_prices),
        }
    }
}

/// Partial `"market"` configuration write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_prices: Option<bool>,
}

impl MarketConfigUpdate {
    pub fn server(server: &str) -> Self {
        Self {
            selected_server: Some(server.to_string()),
            show_prices: None,
        }
    }

    pub fn show_prices(show_prices: bool) -> Self {
        Self {
            selected_server: None,
            show_prices: Some(show_prices),
        }
    }
}
