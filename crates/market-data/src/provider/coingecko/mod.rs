//! CoinGecko provider implementation.
//!
//! Works keyless against the public API; a demo key raises the quota.
//!
//! # API Endpoints
//!
//! - Quotes (single and batch): `GET /simple/price?ids=bitcoin,ethereum&vs_currencies=usd&...`
//! - History: `GET /coins/{id}/market_chart?vs_currency=usd&days=30`
//! - Health: `GET /ping`
//!
//! Unknown ids are silently left out of `/simple/price` and return 404 from
//! `market_chart`; both surface as empty outcomes.

mod models;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::{debug, warn};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{CanonicalQuote, Category, FetchOutcome, HistorySeries, HistoryWindow};
use crate::normalize::normalize_history;
use crate::provider::http::{build_client, send};
use crate::provider::{
    MarketDataProvider, ProviderCapabilities, RateBudget, SymbolTable, SymbolTransform,
};

use models::{MarketChart, SimplePriceEntry};

pub const PROVIDER_ID: &str = "COINGECKO";

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const API_KEY_HEADER: &str = "x-cg-demo-api-key";
const VS_CURRENCY: &str = "usd";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// CoinGecko provider for crypto quotes and market charts.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    symbols: SymbolTable,
}

impl CoinGeckoProvider {
    pub fn new() -> Self {
        Self {
            client: build_client(REQUEST_TIMEOUT),
            base_url: BASE_URL.to_string(),
            api_key: None,
            symbols: Self::default_symbols(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = symbols;
        self
    }

    /// Ticker shorthands mapped to CoinGecko coin ids.
    pub fn default_symbols() -> SymbolTable {
        SymbolTable::new(SymbolTransform::Lowercase)
            .with("btc", "bitcoin")
            .with("eth", "ethereum")
            .with("sol", "solana")
            .with("bnb", "binancecoin")
            .with("xrp", "ripple")
            .with("ada", "cardano")
            .with("doge", "dogecoin")
            .with("dot", "polkadot")
            .with("ltc", "litecoin")
            .with("link", "chainlink")
            .with("avax", "avalanche-2")
            .with("trx", "tron")
    }

    pub fn provider_symbol(&self, symbol: &str) -> String {
        self.symbols.to_provider(symbol)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    fn simple_price_request(&self, ids: &str) -> RequestBuilder {
        self.get("/simple/price").query(&[
            ("ids", ids),
            ("vs_currencies", VS_CURRENCY),
            ("include_market_cap", "true"),
            ("include_24hr_vol", "true"),
            ("include_24hr_change", "true"),
            ("include_last_updated_at", "true"),
        ])
    }

    fn parse_simple_price(body: &str) -> Result<HashMap<String, SimplePriceEntry>, MarketDataError> {
        serde_json::from_str(body).map_err(|e| {
            MarketDataError::data(PROVIDER_ID, format!("Failed to parse simple price: {}", e))
        })
    }

    /// Convert a simple-price entry into a canonical quote.
    ///
    /// CoinGecko only reports the percentage change, so the absolute change
    /// is derived from it: `change = price * pct / (100 + pct)`.
    fn entry_to_quote(
        caller_symbol: &str,
        entry: SimplePriceEntry,
    ) -> Result<CanonicalQuote, MarketDataError> {
        let price = entry
            .usd
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| MarketDataError::data(PROVIDER_ID, "missing or non-positive usd price"))?;

        let change_pct = entry.usd_24h_change.unwrap_or_default();
        let denominator = Decimal::ONE_HUNDRED + change_pct;
        let change = if denominator.is_zero() {
            Decimal::ZERO
        } else {
            (price * change_pct / denominator).round_dp(8)
        };

        let last_updated = entry
            .last_updated_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(CanonicalQuote::new(caller_symbol, price, last_updated, PROVIDER_ID)
            .with_change(change, change_pct)
            .with_volume(entry.usd_24h_vol)
            .with_market_cap(entry.usd_market_cap))
    }

    /// Zip the price and volume series into `[ts, price, volume]` rows.
    fn chart_rows(chart: MarketChart) -> Vec<Value> {
        let volumes: HashMap<String, Value> = chart
            .total_volumes
            .into_iter()
            .filter_map(|row| match row {
                Value::Array(mut pair) if pair.len() >= 2 => {
                    let volume = pair.swap_remove(1);
                    Some((pair[0].to_string(), volume))
                }
                _ => None,
            })
            .collect();

        chart
            .prices
            .into_iter()
            .map(|row| match row {
                Value::Array(mut pair) if pair.len() == 2 => {
                    if let Some(volume) = volumes.get(&pair[0].to_string()) {
                        pair.push(volume.clone());
                    }
                    Value::Array(pair)
                }
                other => other,
            })
            .collect()
    }

    fn parse_market_chart(body: &str) -> Result<Option<HistorySeries>, MarketDataError> {
        let chart: MarketChart = serde_json::from_str(body).map_err(|e| {
            MarketDataError::data(PROVIDER_ID, format!("Failed to parse market chart: {}", e))
        })?;
        Ok(normalize_history(&Self::chart_rows(chart)))
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            categories: &[Category::Quote, Category::History],
            supports_batch: true,
        }
    }

    fn rate_budget(&self) -> RateBudget {
        if self.api_key.is_some() {
            RateBudget::per_minute(30)
        } else {
            RateBudget::per_minute(10)
        }
    }

    fn timeout(&self) -> Option<Duration> {
        Some(REQUEST_TIMEOUT)
    }

    async fn fetch_quote(&self, symbol: &str) -> FetchOutcome<CanonicalQuote> {
        let id = self.provider_symbol(symbol);

        let result = match send(PROVIDER_ID, self.simple_price_request(&id)).await {
            Ok(Some(body)) => Self::parse_simple_price(&body).and_then(|mut entries| {
                match entries.remove(&id) {
                    Some(entry) => Self::entry_to_quote(symbol, entry).map(Some),
                    None => Ok(None),
                }
            }),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        result.into()
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
    ) -> FetchOutcome<HistorySeries> {
        let id = self.provider_symbol(symbol);
        let days = window.num_days().to_string();
        let path = format!("/coins/{}/market_chart", urlencoding::encode(&id));
        let request = self
            .get(&path)
            .query(&[("vs_currency", VS_CURRENCY), ("days", days.as_str())]);

        let result = match send(PROVIDER_ID, request).await {
            Ok(Some(body)) => Self::parse_market_chart(&body),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        result.into()
    }

    async fn fetch_batch_quotes(
        &self,
        symbols: &[String],
    ) -> FetchOutcome<HashMap<String, CanonicalQuote>> {
        let mut callers_by_id: HashMap<String, Vec<String>> = HashMap::new();
        for symbol in symbols {
            callers_by_id
                .entry(self.provider_symbol(symbol))
                .or_default()
                .push(symbol.clone());
        }
        if callers_by_id.is_empty() {
            return FetchOutcome::Empty;
        }

        let mut ids: Vec<&str> = callers_by_id.keys().map(String::as_str).collect();
        ids.sort_unstable();
        let ids = ids.join(",");

        let entries = match send(PROVIDER_ID, self.simple_price_request(&ids)).await {
            Ok(Some(body)) => match Self::parse_simple_price(&body) {
                Ok(entries) => entries,
                Err(e) => return FetchOutcome::Failure(e),
            },
            Ok(None) => return FetchOutcome::Empty,
            Err(e) => return FetchOutcome::Failure(e),
        };

        let mut quotes = HashMap::new();
        for (id, entry) in entries {
            let Some(callers) = callers_by_id.get(&id) else {
                continue;
            };
            for caller in callers {
                match Self::entry_to_quote(caller, entry.clone()) {
                    Ok(quote) => {
                        quotes.insert(caller.clone(), quote);
                    }
                    Err(e) => debug!("{}: dropping {} from batch: {}", PROVIDER_ID, caller, e),
                }
            }
        }

        if quotes.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Data(quotes)
        }
    }

    async fn health_check(&self) -> bool {
        match send(PROVIDER_ID, self.get("/ping")).await {
            Ok(_) => true,
            Err(e) => {
                warn!("{} health check failed: {}", PROVIDER_ID, e);
                false
            }
        }
    }
}
