//! Market ranking retrieval.
//!
//! A `RankingProvider` performs the raw HTTP call against one market data API and
//! maps its payload to `Entity` rows, surfacing every failure as an error. The
//! `DataFetcher` on top never fails: errors, timeouts and non-success statuses
//! become an empty list (and a log line), the stable reference asset is filtered
//! out and the provider's market-cap ordering is kept while truncating.

use crate::http;
use digest_common::net::{COINGECKO_URL, COINMARKETCAP_URL, EXCLUDED_SYMBOL, FETCH_TIMEOUT, REQUEST_LIMIT};
use digest_common::provider::ProviderKind;
use digest_common::{Entity, Result};
use log::{error, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Raw access to a ranking API.
pub trait RankingProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch up to `limit` rows ordered by market capitalization, descending.
    fn fetch_listings(&self, limit: usize) -> Result<Vec<Entity>>;
}

/// Build the provider selected in the configuration.
pub fn provider_for(kind: ProviderKind, api_key: Option<String>) -> Arc<dyn RankingProvider> {
    match kind {
        ProviderKind::CoinMarketCap => {
            if api_key.is_none() {
                warn!("CMC_API_KEY is not set; CoinMarketCap requests will be rejected");
            }
            Arc::new(CoinMarketCap::new(api_key))
        }
        ProviderKind::CoinGecko => Arc::new(CoinGecko::new()),
    }
}

/// CoinMarketCap `listings/latest` client.
pub struct CoinMarketCap {
    agent: ureq::Agent,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct CmcListings {
    #[serde(default)]
    data: Vec<CmcListing>,
}

#[derive(Deserialize)]
struct CmcListing {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    quote: HashMap<String, CmcQuote>,
}

#[derive(Deserialize)]
struct CmcQuote {
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    percent_change_24h: Option<f64>,
}

impl CoinMarketCap {
    /// Client against the public endpoint.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            agent: http::agent(FETCH_TIMEOUT),
            endpoint: String::from(COINMARKETCAP_URL),
            api_key,
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = String::from(endpoint);
        self
    }
}

impl RankingProvider for CoinMarketCap {
    fn name(&self) -> &'static str {
        "CoinMarketCap"
    }

    fn fetch_listings(&self, limit: usize) -> Result<Vec<Entity>> {
        let mut request = self
            .agent
            .get(&self.endpoint)
            .query("start", "1")
            .query("limit", &limit.to_string())
            .query("convert", "USD")
            .set("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("X-CMC_PRO_API_KEY", key);
        }

        let listings: CmcListings = http::get_json(request)?;
        Ok(listings
            .data
            .into_iter()
            .map(|listing| {
                let usd = listing.quote.get("USD");
                Entity {
                    name: listing.name.unwrap_or_else(|| String::from("Unknown")),
                    symbol: listing.symbol.unwrap_or_default(),
                    price: usd.and_then(|q| q.price).unwrap_or(0.0),
                    change_24h: usd.and_then(|q| q.percent_change_24h).unwrap_or(0.0),
                }
            })
            .collect())
    }
}

/// CoinGecko `coins/markets` client.
pub struct CoinGecko {
    agent: ureq::Agent,
    endpoint: String,
}

#[derive(Deserialize)]
struct GeckoMarket {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
}

impl CoinGecko {
    /// Client against the public endpoint.
    pub fn new() -> Self {
        Self {
            agent: http::agent(FETCH_TIMEOUT),
            endpoint: String::from(COINGECKO_URL),
        }
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = String::from(endpoint);
        self
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.agent = http::agent(timeout);
        self
    }
}

impl Default for CoinGecko {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingProvider for CoinGecko {
    fn name(&self) -> &'static str {
        "CoinGecko"
    }

    fn fetch_listings(&self, limit: usize) -> Result<Vec<Entity>> {
        let request = self
            .agent
            .get(&self.endpoint)
            .query("vs_currency", "usd")
            .query("order", "market_cap_desc")
            .query("per_page", &limit.to_string())
            .query("page", "1")
            .query("sparkline", "false");

        let markets: Vec<GeckoMarket> = http::get_json(request)?;
        Ok(markets
            .into_iter()
            .map(|market| Entity {
                name: market.name.unwrap_or_else(|| String::from("Unknown")),
                symbol: market.symbol.unwrap_or_default().to_uppercase(),
                price: market.current_price.unwrap_or(0.0),
                change_24h: market.price_change_percentage_24h.unwrap_or(0.0),
            })
            .collect())
    }
}

/// Failure-free ranking fetch used by every delivery.
pub struct DataFetcher {
    provider: Arc<dyn RankingProvider>,
    excluded_symbol: String,
}

impl DataFetcher {
    /// Wrap `provider`, excluding the default stable asset.
    pub fn new(provider: Arc<dyn RankingProvider>) -> Self {
        Self {
            provider,
            excluded_symbol: String::from(EXCLUDED_SYMBOL),
        }
    }

    /// Top `limit` entities, or an empty list when the provider failed.
    pub fn fetch_rankings(&self, limit: usize) -> Vec<Entity> {
        info!("Fetching crypto data from {}...", self.provider.name());
        let request_limit = REQUEST_LIMIT.max(limit + 1);

        match self.provider.fetch_listings(request_limit) {
            Ok(entities) => {
                let result: Vec<Entity> = entities
                    .into_iter()
                    .filter(|e| !e.symbol.is_empty() && !e.symbol.eq_ignore_ascii_case(&self.excluded_symbol))
                    .take(limit)
                    .collect();
                info!("Successfully fetched {} cryptocurrencies", result.len());
                result
            }
            Err(e) => {
                error!("Fetching rankings from {} failed: {}", self.provider.name(), e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, http_response, serve_once, serve_silently};
    use digest_common::AgentError;
    use digest_common::net::DISPLAY_COUNT;
    use std::time::Duration;

    fn coins(symbols: &[&str]) -> Vec<Entity> {
        symbols
            .iter()
            .enumerate()
            .map(|(i, s)| Entity::new(s, s, 100.0 - i as f64, 0.5))
            .collect()
    }

    #[test]
    fn filters_stable_asset_and_truncates_in_order() {
        let provider = Arc::new(ScriptedProvider::returning(coins(&[
            "BTC", "ETH", "USDT", "BNB", "SOL", "XRP", "DOGE",
        ])));
        let fetcher = DataFetcher::new(provider.clone());

        let symbols: Vec<String> = fetcher
            .fetch_rankings(DISPLAY_COUNT)
            .into_iter()
            .map(|e| e.symbol)
            .collect();

        assert_eq!(symbols, vec!["BTC", "ETH", "BNB", "SOL", "XRP"]);
        assert_eq!(provider.requested_limits(), vec![REQUEST_LIMIT]);
    }

    #[test]
    fn provider_errors_become_an_empty_list() {
        let provider = Arc::new(ScriptedProvider::failing(AgentError::Transport("timed out".into())));
        let fetcher = DataFetcher::new(provider);
        assert!(fetcher.fetch_rankings(DISPLAY_COUNT).is_empty());
    }

    #[test]
    fn non_success_status_yields_empty_list() {
        let url = serve_once(http_response("500 Internal Server Error", "{\"error\":\"boom\"}"));
        let fetcher = DataFetcher::new(Arc::new(CoinGecko::new().with_endpoint(&url)));
        assert!(fetcher.fetch_rankings(DISPLAY_COUNT).is_empty());
    }

    #[test]
    fn timeout_yields_empty_list() {
        let url = serve_silently(Duration::from_secs(2));
        let provider = CoinGecko::new()
            .with_endpoint(&url)
            .with_timeout(Duration::from_millis(200));
        let fetcher = DataFetcher::new(Arc::new(provider));
        assert!(fetcher.fetch_rankings(DISPLAY_COUNT).is_empty());
    }

    #[test]
    fn decodes_coingecko_array() {
        let body = r#"[
            {"name":"Bitcoin","symbol":"btc","current_price":64000.5,"price_change_percentage_24h":1.25},
            {"name":"Tether","symbol":"usdt","current_price":1.0,"price_change_percentage_24h":0.01},
            {"name":"Pepe","symbol":"pepe","current_price":0.0000091,"price_change_percentage_24h":null}
        ]"#;
        let url = serve_once(http_response("200 OK", body));
        let fetcher = DataFetcher::new(Arc::new(CoinGecko::new().with_endpoint(&url)));

        let entities = fetcher.fetch_rankings(DISPLAY_COUNT);
        assert_eq!(
            entities,
            vec![
                Entity::new("Bitcoin", "BTC", 64000.5, 1.25),
                Entity::new("Pepe", "PEPE", 0.0000091, 0.0),
            ]
        );
    }

    #[test]
    fn decodes_coinmarketcap_envelope() {
        let body = r#"{"status":{"error_code":0},"data":[
            {"name":"Bitcoin","symbol":"BTC","quote":{"USD":{"price":64000.0,"percent_change_24h":-2.5}}},
            {"name":"Ethereum","symbol":"ETH","quote":{}}
        ]}"#;
        let url = serve_once(http_response("200 OK", body));
        let provider = CoinMarketCap::new(Some("key".into())).with_endpoint(&url);

        let entities = provider.fetch_listings(REQUEST_LIMIT).unwrap();
        assert_eq!(entities[0], Entity::new("Bitcoin", "BTC", 64000.0, -2.5));
        assert_eq!(entities[1], Entity::new("Ethereum", "ETH", 0.0, 0.0));
    }
}
