//! CoinGecko API response models.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Per-coin entry of `/simple/price` with `vs_currencies=usd` and all
/// `include_*` flags set.
#[derive(Clone, Debug, Deserialize)]
pub struct SimplePriceEntry {
    pub usd: Option<Decimal>,
    #[serde(default)]
    pub usd_market_cap: Option<Decimal>,
    #[serde(default)]
    pub usd_24h_vol: Option<Decimal>,
    /// Percentage change over 24h
    #[serde(default)]
    pub usd_24h_change: Option<Decimal>,
    /// Epoch seconds
    #[serde(default)]
    pub last_updated_at: Option<i64>,
}

/// `/coins/{id}/market_chart` body.
///
/// Each series is a list of `[epoch_ms, value]` pairs.
#[derive(Debug, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<Value>,
    #[serde(default)]
    pub total_volumes: Vec<Value>,
}
