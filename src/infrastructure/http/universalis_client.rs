use super::GlooHttpClient;
use crate::domain::errors::NetworkError;
use crate::domain::logging::{LogComponent, get_logger, get_time_provider};
use crate::domain::market_data::{PriceData, PriceProvider};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::Deserialize;

/// Largest id list the aggregated endpoint accepts per request.
pub const MAX_ITEMS_PER_REQUEST: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedResponse {
    #[serde(default)]
    results: Vec<AggregatedItem>,
    #[serde(default)]
    failed_items: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedItem {
    item_id: u32,
    #[serde(default)]
    nq: QualityStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QualityStats {
    min_listing: ScopedValues,
    average_sale_price: ScopedValues,
    recent_purchase: ScopedValues,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScopedValues {
    world: Option<ScopedValue>,
    dc: Option<ScopedValue>,
}

impl ScopedValues {
    fn widest(&self) -> Option<&ScopedValue> {
        self.dc.as_ref().or(self.world.as_ref())
    }

    fn highest_price(&self) -> Option<f64> {
        [self.world.as_ref(), self.dc.as_ref()]
            .into_iter()
            .flatten()
            .map(|v| v.price)
            .reduce(f64::max)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopedValue {
    price: f64,
    world_id: Option<u32>,
    timestamp: Option<u64>,
}

/// `aggregated/{scope}/{id,id,...}`, relative to the API base.
pub fn aggregated_path(scope: &str, item_ids: &[u32]) -> String {
    let ids = item_ids
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("aggregated/{scope}/{ids}")
}

pub fn aggregated_url(base_url: &str, scope: &str, item_ids: &[u32]) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), aggregated_path(scope, item_ids))
}

/// Turns an aggregated response body into prices.
///
/// Items without a normal-quality listing are skipped. When no recent
/// purchase carries a timestamp, `fetched_at` is used as the update time.
///
/// The endpoint reports only cheapest listings, so the maximum price is the
/// highest of the per-scope minimums (world and data center).
pub fn parse_aggregated(body: &str, fetched_at: u64) -> Result<Vec<PriceData>, NetworkError> {
    let response: AggregatedResponse =
        serde_json::from_str(body).map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
    Ok(prices_from(response, fetched_at))
}

fn prices_from(response: AggregatedResponse, fetched_at: u64) -> Vec<PriceData> {
    if !response.failed_items.is_empty() {
        get_logger().warn(
            LogComponent::Infrastructure("Universalis"),
            &format!("Provider failed items: {:?}", response.failed_items),
        );
    }

    response
        .results
        .into_iter()
        .filter_map(|item| {
            let listing = item.nq.min_listing.widest()?;
            let average = item
                .nq
                .average_sale_price
                .widest()
                .map(|v| v.price)
                .unwrap_or(listing.price);
            let last_update = item
                .nq
                .recent_purchase
                .widest()
                .and_then(|v| v.timestamp)
                .unwrap_or(fetched_at);

            let highest = item.nq.min_listing.highest_price().unwrap_or(listing.price);
            let mut price = PriceData::new(item.item_id, average, listing.price, highest)
                .with_last_update(last_update);
            if let Some(world_id) = listing.world_id {
                price = price.with_world(world_id);
            }
            Some(price)
        })
        .collect()
}

/// [`PriceProvider`] for the Universalis market board API.
#[derive(Debug, Clone)]
pub struct UniversalisClient {
    http: GlooHttpClient,
}

impl UniversalisClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: GlooHttpClient::new(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn fetch_aggregated(&self, item_ids: &[u32], scope: &str) -> Result<Vec<PriceData>, NetworkError> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        if item_ids.len() > MAX_ITEMS_PER_REQUEST {
            return Err(NetworkError::HttpRequestFailed(format!(
                "{} items exceeds the per-request limit of {MAX_ITEMS_PER_REQUEST}",
                item_ids.len()
            )));
        }

        let path = aggregated_path(scope, item_ids);
        let response: AggregatedResponse = self.http.get_json(&path).await?;
        let prices = prices_from(response, get_time_provider().current_timestamp());

        get_logger().debug(
            LogComponent::Infrastructure("Universalis"),
            &format!("{} of {} items priced on {scope}", prices.len(), item_ids.len()),
        );
        Ok(prices)
    }
}

impl PriceProvider for UniversalisClient {
    fn fetch_prices<'a>(
        &'a self,
        item_ids: &'a [u32],
        scope: &'a str,
    ) -> LocalBoxFuture<'a, Result<Vec<PriceData>, NetworkError>> {
        self.fetch_aggregated(item_ids, scope).boxed_local()
    }
}
