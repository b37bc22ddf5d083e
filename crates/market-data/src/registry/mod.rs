//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Provider lookup and per-category priority ordering
//! - Rate limiting per provider
//! - Circuit breaking for fault tolerance
//! - Retry with exponential backoff
//! - Validation of normalized data
//! - Shared state stores (in-memory and SQLite)

mod circuit_breaker;
mod orchestrator;
mod provider_registry;
mod rate_limiter;
mod retry_policy;
mod skip_reason;
mod sqlite_store;
mod state_store;
mod validator;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState, ProviderHealthState,
};
pub use orchestrator::{MarketDataOrchestrator, ProviderStatus, Resolution};
pub use provider_registry::{
    PriorityConfig, PriorityEntry, ProviderDescriptor, ProviderLookup, StaticProviderRegistry,
};
pub use rate_limiter::{RateLimiter, TokenBucket};
pub use retry_policy::RetryPolicy;
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use sqlite_store::SqliteStateStore;
pub use state_store::{InMemoryStateStore, StateStore};
pub use validator::{DataValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
