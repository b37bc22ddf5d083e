//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining backoff behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Provider-facing variants are classified via [`retry_class`](Self::retry_class)
/// (should the call be retried with backoff?) and
/// [`counts_as_failure`](Self::counts_as_failure) (does it feed the circuit breaker?).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// Network-level failure talking to the provider (connect, reset, non-2xx).
    #[error("Transport error: {provider} - {message}")]
    Transport {
        /// The provider that failed
        provider: String,
        /// Underlying transport message
        message: String,
    },

    /// The upstream call exceeded its time budget.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider signalled an explicit quota breach (HTTP 429 or equivalent).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The provider rejected our credentials.
    #[error("Authentication failed: {provider}")]
    Auth {
        /// The provider that rejected the credential
        provider: String,
    },

    /// The transport succeeded but the payload was malformed or incomplete.
    #[error("Data error: {provider} - {message}")]
    Data {
        /// The provider that returned bad data
        provider: String,
        /// What was wrong with the payload
        message: String,
    },

    /// The provider registry could not supply an adapter for this id.
    #[error("Provider unavailable: {provider}")]
    ProviderUnavailable {
        /// The provider id that was looked up
        provider: String,
    },

    /// The adapter does not offer this operation.
    #[error("Operation '{operation}' not supported by provider: {provider}")]
    NotSupported {
        /// The operation that was attempted
        operation: String,
        /// The provider that doesn't support it
        provider: String,
    },

    /// Normalized data violated a canonical invariant.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// A state or cache backend failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MarketDataError {
    /// Returns the backoff classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricefeed_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "BINANCE".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::RateLimited);
    ///
    /// let error = MarketDataError::Auth { provider: "COINGECKO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Other);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } => RetryClass::RateLimited,
            Self::Transport { .. } | Self::Timeout { .. } => RetryClass::Network,
            // Retrying a rejected credential or a malformed payload cannot help
            Self::Auth { .. }
            | Self::Data { .. }
            | Self::ProviderUnavailable { .. }
            | Self::NotSupported { .. }
            | Self::ValidationFailed { .. }
            | Self::Store(_)
            | Self::Config(_) => RetryClass::Other,
        }
    }

    /// Whether this error should be recorded against the provider's circuit.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(
            self,
            Self::NotSupported { .. } | Self::Store(_) | Self::Config(_)
        )
    }

    /// Whether this error came from an explicit upstream quota signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Short machine-readable label, used in diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Auth { .. } => "auth",
            Self::Data { .. } => "data",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::NotSupported { .. } => "not_supported",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
        }
    }

    pub(crate) fn transport(provider: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn data(provider: &str, message: impl Into<String>) -> Self {
        Self::Data {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_supported(provider: &str, operation: &str) -> Self {
        Self::NotSupported {
            operation: operation.to_string(),
            provider: provider.to_string(),
        }
    }
}

impl From<rusqlite::Error> for MarketDataError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(format!("serialization: {}", e))
    }
}
