//! Market-board price caching and synchronization for the browser.
//!
//! `domain` holds the entities, contracts and events, `infrastructure` the
//! storage, HTTP and runtime adapters, and `application` the price client and
//! the market board service built on top of them.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Installs the console logger, browser clock and panic hook.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn initialize() {
    use domain::logging::{LogComponent, get_logger};

    console_error_panic_hook::set_once();

    let console_logger = if cfg!(debug_assertions) {
        infrastructure::services::ConsoleLogger::new_development()
    } else {
        infrastructure::services::ConsoleLogger::new_production()
    };
    domain::logging::init_logger(Box::new(console_logger));
    domain::logging::init_time_provider(Box::new(infrastructure::services::BrowserTimeProvider::new()));

    get_logger().info(
        LogComponent::Presentation("Initialize"),
        "Market price cache initialized",
    );
}

/// `1234567` -> `"1,234,567G"`
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = formatPrice)]
pub fn format_price(price: f64) -> String {
    application::format_price(price)
}
