//! Binance spot market provider.
//!
//! Public endpoints, no API key required.
//!
//! # API Endpoints
//!
//! - Latest quote: `GET /api/v3/ticker/24hr?symbol=BTCUSDT`
//! - Batch quotes: `GET /api/v3/ticker/24hr?symbols=["BTCUSDT","ETHUSDT"]`
//! - History: `GET /api/v3/klines?symbol=BTCUSDT&interval=1d&limit=30`
//! - Health: `GET /api/v3/ping`
//!
//! Unknown pairs come back as HTTP 400 with `{"code":-1121,"msg":"Invalid symbol."}`,
//! which maps to an empty outcome rather than a failure. A batch request is
//! rejected whole if any one pair is unknown, so the adapter then asks for
//! each pair on its own.

mod models;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::future::join_all;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{CanonicalQuote, Category, FetchOutcome, HistorySeries, HistoryWindow};
use crate::normalize::normalize_history;
use crate::provider::http::{build_client, send};
use crate::provider::{
    MarketDataProvider, ProviderCapabilities, RateBudget, SymbolTable, SymbolTransform,
};

use models::Ticker24hr;

pub const PROVIDER_ID: &str = "BINANCE";

const BASE_URL: &str = "https://api.binance.com";
const QUOTE_SUFFIX: &str = "USDT";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_KLINES: u32 = 1000;

/// Binance provider for crypto spot quotes and klines.
///
/// # Example
///
/// ```ignore
/// let provider = BinanceProvider::new();
/// let outcome = provider.fetch_quote("bitcoin").await;
/// ```
pub struct BinanceProvider {
    client: Client,
    base_url: String,
    symbols: SymbolTable,
}

impl BinanceProvider {
    pub fn new() -> Self {
        Self {
            client: build_client(REQUEST_TIMEOUT),
            base_url: BASE_URL.to_string(),
            symbols: Self::default_symbols(),
        }
    }

    /// Point the adapter at another host (testnet, proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = symbols;
        self
    }

    /// Common coin names mapped to their USDT pairs.
    pub fn default_symbols() -> SymbolTable {
        SymbolTable::new(SymbolTransform::UppercaseWithSuffix(QUOTE_SUFFIX))
            .with("bitcoin", "BTCUSDT")
            .with("btc", "BTCUSDT")
            .with("ethereum", "ETHUSDT")
            .with("eth", "ETHUSDT")
            .with("solana", "SOLUSDT")
            .with("binancecoin", "BNBUSDT")
            .with("ripple", "XRPUSDT")
            .with("cardano", "ADAUSDT")
            .with("dogecoin", "DOGEUSDT")
            .with("polkadot", "DOTUSDT")
            .with("litecoin", "LTCUSDT")
            .with("chainlink", "LINKUSDT")
            .with("avalanche-2", "AVAXUSDT")
            .with("tron", "TRXUSDT")
    }

    pub fn provider_symbol(&self, symbol: &str) -> String {
        self.symbols.to_provider(symbol)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a ticker into a canonical quote for `caller_symbol`.
    fn ticker_to_quote(
        caller_symbol: &str,
        ticker: Ticker24hr,
    ) -> Result<CanonicalQuote, MarketDataError> {
        if ticker.last_price <= Decimal::ZERO {
            return Err(MarketDataError::data(
                PROVIDER_ID,
                format!("non-positive lastPrice for {}", ticker.symbol),
            ));
        }

        let last_updated = ticker
            .close_time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Ok(
            CanonicalQuote::new(caller_symbol, ticker.last_price, last_updated, PROVIDER_ID)
                .with_change(
                    ticker.price_change.unwrap_or_default(),
                    ticker.price_change_percent.unwrap_or_default(),
                )
                .with_range(ticker.high_price, ticker.low_price)
                .with_volume(ticker.volume),
        )
    }

    fn parse_ticker(caller_symbol: &str, body: &str) -> Result<CanonicalQuote, MarketDataError> {
        let ticker: Ticker24hr = serde_json::from_str(body).map_err(|e| {
            MarketDataError::data(PROVIDER_ID, format!("Failed to parse ticker: {}", e))
        })?;
        Self::ticker_to_quote(caller_symbol, ticker)
    }

    /// Parse a batch ticker body, keyed back to the caller's symbols.
    ///
    /// Entries that fail to convert are skipped.
    fn parse_batch(
        callers_by_pair: &HashMap<String, Vec<String>>,
        body: &str,
    ) -> Result<HashMap<String, CanonicalQuote>, MarketDataError> {
        let tickers: Vec<Value> = serde_json::from_str(body).map_err(|e| {
            MarketDataError::data(PROVIDER_ID, format!("Failed to parse batch tickers: {}", e))
        })?;

        let mut quotes = HashMap::new();
        for raw in tickers {
            let ticker: Ticker24hr = match serde_json::from_value(raw) {
                Ok(t) => t,
                Err(e) => {
                    debug!("{}: skipping malformed batch entry: {}", PROVIDER_ID, e);
                    continue;
                }
            };

            let Some(callers) = callers_by_pair.get(&ticker.symbol) else {
                continue;
            };

            for caller in callers {
                match Self::ticker_to_quote(caller, ticker.clone()) {
                    Ok(quote) => {
                        quotes.insert(caller.clone(), quote);
                    }
                    Err(e) => debug!("{}: dropping {} from batch: {}", PROVIDER_ID, caller, e),
                }
            }
        }

        Ok(quotes)
    }

    /// Kline interval and row count covering `window`.
    ///
    /// Short windows use hourly candles so there is more than a point or two.
    fn klines_params(window: HistoryWindow) -> (&'static str, u32) {
        let days = window.num_days();
        if days <= 2 {
            ("1h", days * 24)
        } else {
            ("1d", days.min(MAX_KLINES))
        }
    }

    /// Quote each pair with its own request, keeping only the ones that succeed.
    async fn fetch_pairs_individually(
        &self,
        callers_by_pair: &HashMap<String, Vec<String>>,
    ) -> FetchOutcome<HashMap<String, CanonicalQuote>> {
        let lookups = callers_by_pair.iter().filter_map(|(pair, callers)| {
            let first = callers.first()?;
            Some(async move { (pair, callers, self.fetch_quote(first).await) })
        });

        let mut quotes = HashMap::new();
        let mut last_error = None;
        for (pair, callers, outcome) in join_all(lookups).await {
            match outcome {
                FetchOutcome::Data(quote) => {
                    for caller in callers {
                        let mut quote = quote.clone();
                        quote.symbol = caller.clone();
                        quotes.insert(caller.clone(), quote);
                    }
                }
                FetchOutcome::Empty => debug!("{}: no ticker for {}", PROVIDER_ID, pair),
                FetchOutcome::Failure(e) => {
                    debug!("{}: dropping {} from batch: {}", PROVIDER_ID, pair, e);
                    last_error = Some(e);
                }
            }
        }

        match (quotes.is_empty(), last_error) {
            (false, _) => FetchOutcome::Data(quotes),
            (true, Some(e)) => FetchOutcome::Failure(e),
            (true, None) => FetchOutcome::Empty,
        }
    }

    fn parse_klines(body: &str) -> Result<Option<HistorySeries>, MarketDataError> {
        let rows: Vec<Value> = serde_json::from_str(body).map_err(|e| {
            MarketDataError::data(PROVIDER_ID, format!("Failed to parse klines: {}", e))
        })?;
        Ok(normalize_history(&rows))
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
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
        // Request weight limit is 6000/min; ticker calls cost 2-80
        RateBudget::per_minute(1200)
    }

    fn timeout(&self) -> Option<Duration> {
        Some(REQUEST_TIMEOUT)
    }

    async fn fetch_quote(&self, symbol: &str) -> FetchOutcome<CanonicalQuote> {
        let pair = self.provider_symbol(symbol);
        let request = self
            .client
            .get(self.url("/api/v3/ticker/24hr"))
            .query(&[("symbol", pair.as_str())]);

        let result = match send(PROVIDER_ID, request).await {
            Ok(Some(body)) => Self::parse_ticker(symbol, &body).map(Some),
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
        let pair = self.provider_symbol(symbol);
        let (interval, limit) = Self::klines_params(window);
        let limit = limit.to_string();
        let request = self.client.get(self.url("/api/v3/klines")).query(&[
            ("symbol", pair.as_str()),
            ("interval", interval),
            ("limit", limit.as_str()),
        ]);

        let result = match send(PROVIDER_ID, request).await {
            Ok(Some(body)) => Self::parse_klines(&body),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        result.into()
    }

    async fn fetch_batch_quotes(
        &self,
        symbols: &[String],
    ) -> FetchOutcome<HashMap<String, CanonicalQuote>> {
        let mut callers_by_pair: HashMap<String, Vec<String>> = HashMap::new();
        for symbol in symbols {
            callers_by_pair
                .entry(self.provider_symbol(symbol))
                .or_default()
                .push(symbol.clone());
        }
        if callers_by_pair.is_empty() {
            return FetchOutcome::Empty;
        }

        let mut pairs: Vec<&String> = callers_by_pair.keys().collect();
        pairs.sort();
        let encoded = serde_json::to_string(&pairs).unwrap_or_else(|_| "[]".to_string());

        let request = self
            .client
            .get(self.url("/api/v3/ticker/24hr"))
            .query(&[("symbols", encoded.as_str())]);

        match send(PROVIDER_ID, request).await {
            Ok(Some(body)) => Self::parse_batch(&callers_by_pair, &body)
                .map(|quotes| if quotes.is_empty() { None } else { Some(quotes) })
                .into(),
            Ok(None) if callers_by_pair.len() > 1 => {
                debug!(
                    "{}: batch of {} pairs rejected, quoting pairs one by one",
                    PROVIDER_ID,
                    callers_by_pair.len()
                );
                self.fetch_pairs_individually(&callers_by_pair).await
            }
            Ok(None) => FetchOutcome::Empty,
            Err(e) => FetchOutcome::Failure(e),
        }
    }

    async fn health_check(&self) -> bool {
        let request = self.client.get(self.url("/api/v3/ping"));
        match send(PROVIDER_ID, request).await {
            Ok(_) => true,
            Err(e) => {
                warn!("{} health check failed: {}", PROVIDER_ID, e);
                false
            }
        }
    }
}
