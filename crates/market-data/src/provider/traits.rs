//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{CanonicalQuote, FetchOutcome, HistorySeries, HistoryWindow};

use super::capabilities::{ProviderCapabilities, RateBudget};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// The orchestrator combines the provider's capabilities with the priority
/// configuration to decide when and how to use it.
///
/// Every fetch returns a [`FetchOutcome`]: `Empty` when the provider has
/// nothing for the symbol, `Failure` when the call itself went wrong.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use pricefeed_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateBudget};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             categories: &[Category::Quote],
///             supports_batch: false,
///         }
///     }
///
///     fn rate_budget(&self) -> RateBudget {
///         RateBudget::per_minute(30)
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "BINANCE", "COINGECKO", etc.
    /// Used for logging, circuit breaker tracking and the priority config.
    fn id(&self) -> &'static str;

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Default call budget, seeded into the rate limiter.
    fn rate_budget(&self) -> RateBudget {
        RateBudget::default()
    }

    /// Upstream timeout overriding the category default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Fetch the latest quote for a caller symbol (e.g. "bitcoin").
    ///
    /// The returned quote carries the caller's symbol, not the
    /// provider-specific ticker.
    async fn fetch_quote(&self, symbol: &str) -> FetchOutcome<CanonicalQuote>;

    /// Fetch price history covering `window`.
    async fn fetch_history(&self, symbol: &str, window: HistoryWindow)
        -> FetchOutcome<HistorySeries>;

    /// Fetch quotes for several symbols in one upstream call.
    ///
    /// Symbols the provider cannot serve are omitted from the map; a partial
    /// answer is still `Data`. Default implementation returns `NotSupported`.
    async fn fetch_batch_quotes(
        &self,
        symbols: &[String],
    ) -> FetchOutcome<HashMap<String, CanonicalQuote>> {
        let _ = symbols;
        FetchOutcome::Failure(MarketDataError::not_supported(self.id(), "batch_quotes"))
    }

    /// Cheap liveness check against the upstream.
    async fn health_check(&self) -> bool {
        true
    }
}
