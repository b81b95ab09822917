use crate::domain::errors::ConfigurationError;
use crate::domain::logging::LogComponent;
use crate::domain::market_data::DEFAULT_SERVER;
use crate::infrastructure::cache::DEFAULT_KEY_PREFIX;
use crate::infrastructure::http::universalis_client::MAX_ITEMS_PER_REQUEST;
use crate::infrastructure::runtime::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public Universalis API.
pub const DIRECT_BASE_URL: &str = "https://universalis.app/api/v2";
/// Same-origin proxy used by production builds.
pub const PROXY_BASE_URL: &str = "/api/universalis";

pub const DEFAULT_DATABASE_NAME: &str = "xivdyetools";
pub const DEFAULT_STORE_NAME: &str = "price_cache";

/// How long a cached price may be served without refetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Freshness {
    /// Valid until the cache is cleared.
    #[default]
    Unbounded,
    /// Valid for this many milliseconds after being written.
    MaxAgeMs(u64),
}

impl Freshness {
    pub fn max_age(age: Duration) -> Self {
        Freshness::MaxAgeMs(age.as_millis() as u64)
    }

    pub fn is_fresh(&self, written_at: u64, now: u64) -> bool {
        match self {
            Freshness::Unbounded => true,
            Freshness::MaxAgeMs(max_age) => now.saturating_sub(written_at) <= *max_age,
        }
    }
}

/// Price client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceClientConfig {
    /// Explicit API base, wins over everything else.
    pub base_url: Option<String>,
    pub production: bool,
    /// Scope used by single-item lookups that name neither a world nor a
    /// data center.
    pub default_data_center: String,
    pub database_name: String,
    pub store_name: String,
    pub key_prefix: String,
    pub retry: RetryPolicy,
    pub freshness: Freshness,
    pub chunk_size: usize,
}

impl Default for PriceClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            production: !cfg!(debug_assertions),
            default_data_center: DEFAULT_SERVER.to_string(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            retry: RetryPolicy::default(),
            freshness: Freshness::default(),
            chunk_size: MAX_ITEMS_PER_REQUEST,
        }
    }
}

impl PriceClientConfig {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_default_data_center(mut self, data_center: &str) -> Self {
        self.default_data_center = data_center.to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn resolved_base_url(&self) -> String {
        resolve_base_url(self.base_url.as_deref(), self.production)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(1..=MAX_ITEMS_PER_REQUEST).contains(&self.chunk_size) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "chunk_size must be within 1..={MAX_ITEMS_PER_REQUEST}, got {}",
                self.chunk_size
            )));
        }
        if self.default_data_center.trim().is_empty() {
            return Err(ConfigurationError::MissingConfiguration(
                "default_data_center".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamps every invalid field back into range, logging what was changed.
    pub fn sanitized(mut self) -> Self {
        if let Err(e) = self.validate() {
            crate::log_warn!(LogComponent::Application("PriceClientConfig"), "{e}; falling back to safe values");
            self.chunk_size = self.chunk_size.clamp(1, MAX_ITEMS_PER_REQUEST);
            if self.default_data_center.trim().is_empty() {
                self.default_data_center = DEFAULT_SERVER.to_string();
            }
        }
        self
    }
}

/// Explicit override, then the production proxy, then the public API.
pub fn resolve_base_url(override_url: Option<&str>, production: bool) -> String {
    match override_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None if production => PROXY_BASE_URL.to_string(),
        None => DIRECT_BASE_URL.to_string(),
    }
}
