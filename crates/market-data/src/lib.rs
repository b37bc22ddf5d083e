//! Pricefeed Market Data Crate
//!
//! Resilient multi-provider market data fetching: given a symbol, pick among
//! several upstream providers, respect their call budgets, stop calling the
//! ones that keep failing, normalize whatever they return into one canonical
//! shape and cache the result.
//!
//! # Architecture
//!
//! ```text
//! +------------------------+
//! | MarketDataOrchestrator |  --> cache hit? return
//! +------------------------+
//!             |
//!             v
//! +------------------------+
//! |     PriorityConfig     |  (providers per category)
//! +------------------------+
//!             |
//!             v
//! +------------------------+
//! | CircuitBreaker,        |  (state in a shared StateStore)
//! | RateLimiter            |
//! +------------------------+
//!             |
//!             v
//! +------------------------+
//! | RetryPolicy + timeout  |
//! +------------------------+
//!             |
//!             v
//! +------------------------+
//! |   MarketDataProvider   |  (Binance, CoinGecko, ...)
//! +------------------------+
//!             |
//!             v
//! +------------------------+
//! | DataValidator -> cache |
//! +------------------------+
//! ```
//!
//! # Core Types
//!
//! - [`CanonicalQuote`] - Provider-agnostic price snapshot
//! - [`HistorySeries`] - Strictly ascending, positive-price history
//! - [`FetchOutcome`] - `Data`, `Empty` or `Failure` from one adapter call
//! - [`Resolution`] - `Success` or `Exhausted` from the orchestrator
//! - [`MarketDataError`] - Error taxonomy with retry classification
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = MarketDataOrchestrator::with_reference_providers(
//!     OrchestratorConfig::from_env(),
//!     None,
//! );
//! if let Some(quote) = orchestrator.get_quote("bitcoin").await {
//!     println!("{} = {} ({})", quote.symbol, quote.price, quote.provider_source);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod registry;

// Re-export all public types from models
pub use models::{
    CanonicalQuote, Category, FetchOutcome, HistoryPoint, HistoryResult, HistorySeries,
    HistoryWindow, ProviderId,
};

pub use cache::{CacheBackend, MarketDataCache, MokaCacheBackend};
pub use config::{CategoryPolicy, OrchestratorConfig};
pub use errors::{MarketDataError, RetryClass};

// Re-export provider types
pub use provider::{
    BinanceProvider, CoinGeckoProvider, MarketDataProvider, ProviderCapabilities, RateBudget,
    SymbolTable, SymbolTransform,
};

// Re-export registry types
pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, DataValidator, FetchDiagnostics,
    InMemoryStateStore, MarketDataOrchestrator, PriorityConfig, ProviderAttempt,
    ProviderDescriptor, ProviderLookup, ProviderStatus, RateLimiter, Resolution, RetryPolicy,
    SkipReason, SqliteStateStore, StateStore, StaticProviderRegistry, ValidationSeverity,
};
