//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and call budgets
//! - Per-adapter symbol translation
//! - Reference adapters (Binance, CoinGecko)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The orchestrator doesn't know about specific providers
//! - **Extensible**: New providers can be added by implementing `MarketDataProvider`
//! - **Resilient**: Rate limiting and circuit breakers protect against provider failures
//!
//! Providers receive the caller's symbol and translate it themselves through
//! their [`SymbolTable`]; quotes they return still carry the caller's symbol.

mod capabilities;
mod http;
mod symbols;
mod traits;

pub mod binance;
pub mod coingecko;

// Re-exports
pub use binance::BinanceProvider;
pub use capabilities::{ProviderCapabilities, RateBudget};
pub use coingecko::CoinGeckoProvider;
pub use symbols::{SymbolTable, SymbolTransform};
pub use traits::MarketDataProvider;
