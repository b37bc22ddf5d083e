//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Provider identifier alias and request [`Category`]
//! - `quote` - Canonical quote snapshot ([`CanonicalQuote`])
//! - `history` - Price history ([`HistoryPoint`], [`HistorySeries`], [`HistoryWindow`])
//! - `outcome` - Tagged adapter result ([`FetchOutcome`])

mod history;
mod outcome;
mod quote;
mod types;

pub use history::{HistoryPoint, HistoryResult, HistorySeries, HistoryWindow};
pub use outcome::FetchOutcome;
pub use quote::CanonicalQuote;
pub use types::{Category, ProviderId};
