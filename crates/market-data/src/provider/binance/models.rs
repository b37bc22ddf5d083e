//! Binance spot API response models.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Entry from `/api/v3/ticker/24hr`.
///
/// Binance encodes every decimal as a string to keep precision.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hr {
    pub symbol: String,
    pub last_price: Decimal,
    #[serde(default)]
    pub price_change: Option<Decimal>,
    #[serde(default)]
    pub price_change_percent: Option<Decimal>,
    #[serde(default)]
    pub high_price: Option<Decimal>,
    #[serde(default)]
    pub low_price: Option<Decimal>,
    /// Base asset volume
    #[serde(default)]
    pub volume: Option<Decimal>,
    /// Epoch milliseconds of the end of the 24h window
    #[serde(default)]
    pub close_time: Option<i64>,
}
