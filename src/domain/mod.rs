//! Domain layer: price entities, category rules, events, errors and the
//! logging abstraction. Nothing in here touches browser APIs directly.

pub mod errors;
pub mod events;
pub mod logging;
pub mod market_data;
