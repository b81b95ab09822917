pub mod config;
pub mod market_board_service;
pub mod price_client;

pub use config::*;
pub use market_board_service::*;
pub use price_client::*;
