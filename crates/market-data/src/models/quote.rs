use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Provider-agnostic price snapshot for one symbol.
///
/// Every adapter normalizes its own payload into this shape. The `symbol`
/// is always the caller's vocabulary (e.g. "bitcoin"), never the
/// provider-specific ticker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalQuote {
    /// Symbol as requested by the caller
    pub symbol: String,

    /// Last traded price (required, > 0)
    pub price: Decimal,

    /// Traded volume over the last 24 hours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,

    /// Market capitalisation, when the provider knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    /// Absolute price change over 24 hours
    pub price_change_24h: Decimal,

    /// Percentage price change over 24 hours
    pub price_change_pct_24h: Decimal,

    /// 24h high
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_24h: Option<Decimal>,

    /// 24h low
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_24h: Option<Decimal>,

    /// When the provider last updated this quote
    pub last_updated: DateTime<Utc>,

    /// Provider that produced the quote (BINANCE, COINGECKO, ...)
    pub provider_source: String,
}

impl CanonicalQuote {
    /// Create a quote with only the required fields set.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        last_updated: DateTime<Utc>,
        provider_source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume_24h: None,
            market_cap: None,
            price_change_24h: Decimal::ZERO,
            price_change_pct_24h: Decimal::ZERO,
            high_24h: None,
            low_24h: None,
            last_updated,
            provider_source: provider_source.into(),
        }
    }

    pub fn with_change(mut self, change: Decimal, change_pct: Decimal) -> Self {
        self.price_change_24h = change;
        self.price_change_pct_24h = change_pct;
        self
    }

    pub fn with_range(mut self, high: Option<Decimal>, low: Option<Decimal>) -> Self {
        self.high_24h = high;
        self.low_24h = low;
        self
    }

    pub fn with_volume(mut self, volume: Option<Decimal>) -> Self {
        self.volume_24h = volume;
        self
    }

    pub fn with_market_cap(mut self, market_cap: Option<Decimal>) -> Self {
        self.market_cap = market_cap;
        self
    }
}
