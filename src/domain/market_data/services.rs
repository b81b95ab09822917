use super::entities::Dye;
use super::value_objects::{PriceCategory, PriceCategorySettings};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Category string carried by limited-time and event dyes.
pub const SPECIAL_CATEGORY: &str = "Special";

const BASE_ACQUISITIONS: &[&str] = &["Dye Vendor"];
const CRAFT_ACQUISITIONS: &[&str] = &["Crafting", "Treasure Chest"];
const ALLIED_SOCIETY_ACQUISITIONS: &[&str] = &[
    "Amalj'aa Vendor",
    "Ixali Vendor",
    "Kobold Vendor",
    "Sahagin Vendor",
    "Sylphic Vendor",
];
const COSMIC_ACQUISITIONS: &[&str] = &["Cosmic Exploration", "Cosmic Fortunes"];

/// Acquisition method -> category, for the acquisition-based categories.
static ACQUISITION_INDEX: Lazy<HashMap<&'static str, PriceCategory>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for category in [
        PriceCategory::BaseDyes,
        PriceCategory::CraftDyes,
        PriceCategory::AlliedSocietyDyes,
        PriceCategory::CosmicDyes,
    ] {
        for acquisition in acquisitions_for(category) {
            index.insert(*acquisition, category);
        }
    }
    index
});

/// Known acquisition methods of a category. `SpecialDyes` is matched by item
/// category instead and has none.
pub fn acquisitions_for(category: PriceCategory) -> &'static [&'static str] {
    match category {
        PriceCategory::BaseDyes => BASE_ACQUISITIONS,
        PriceCategory::CraftDyes => CRAFT_ACQUISITIONS,
        PriceCategory::AlliedSocietyDyes => ALLIED_SOCIETY_ACQUISITIONS,
        PriceCategory::CosmicDyes => COSMIC_ACQUISITIONS,
        PriceCategory::SpecialDyes => &[],
    }
}

/// Category an acquisition method belongs to, if any.
pub fn category_for_acquisition(acquisition: &str) -> Option<PriceCategory> {
    ACQUISITION_INDEX.get(acquisition).copied()
}

/// Whether the market price of `dye` is worth fetching under `settings`.
pub fn should_fetch_price(dye: &Dye, settings: &PriceCategorySettings) -> bool {
    if dye.category == SPECIAL_CATEGORY && settings.special_dyes {
        return true;
    }

    dye.acquisition
        .as_deref()
        .and_then(category_for_acquisition)
        .is_some_and(|category| settings.is_enabled(category))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_category_wins_regardless_of_acquisition() {
        let dye = Dye::new(13114, "Pure White", SPECIAL_CATEGORY, None);
        let settings = PriceCategorySettings::none().with(PriceCategory::SpecialDyes, true);
        assert!(should_fetch_price(&dye, &settings));
        assert!(!should_fetch_price(&dye, &PriceCategorySettings::none()));
    }

    #[test]
    fn acquisition_must_match_enabled_category() {
        let dye = Dye::new(5729, "Snow White", "Neutral", Some("Dye Vendor"));
        let crafting_only = PriceCategorySettings::none().with(PriceCategory::CraftDyes, true);
        assert!(!should_fetch_price(&dye, &crafting_only));

        let base = PriceCategorySettings::none().with(PriceCategory::BaseDyes, true);
        assert!(should_fetch_price(&dye, &base));
    }

    #[test]
    fn missing_or_unknown_acquisition_is_never_fetched() {
        let everything = PriceCategorySettings {
            base_dyes: true,
            craft_dyes: true,
            allied_society_dyes: true,
            cosmic_dyes: true,
            special_dyes: false,
        };
        assert!(!should_fetch_price(&Dye::new(1, "a", "Reds", None), &everything));
        assert!(!should_fetch_price(&Dye::new(2, "b", "Reds", Some("Mog Station")), &everything));
    }

    #[test]
    fn index_covers_every_listed_acquisition() {
        assert_eq!(category_for_acquisition("Sylphic Vendor"), Some(PriceCategory::AlliedSocietyDyes));
        assert_eq!(category_for_acquisition("Cosmic Fortunes"), Some(PriceCategory::CosmicDyes));
        assert_eq!(category_for_acquisition("Treasure Chest"), Some(PriceCategory::CraftDyes));
    }
}
