//! Per-provider circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern to prevent cascading failures
//! when a provider is experiencing issues. The circuit has three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Provider is failing, requests are blocked.
//! - **HalfOpen**: Recovery timeout elapsed, exactly one trial request is
//!   allowed through. Its outcome closes or reopens the circuit.
//!
//! Circuit records live in an injected [`StateStore`], created lazily on the
//! first failure. With the SQLite store they survive restarts and are shared
//! between processes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::state_store::{InMemoryStateStore, StateStore};
use crate::errors::MarketDataError;
use crate::models::ProviderId;

/// Default number of failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// Testing recovery - one trial request allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Persisted circuit record for a single provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealthState {
    pub status: CircuitState,
    /// Failures since the last success (weighted, see `rate_limit_failure_weight`).
    pub consecutive_failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
    /// Set while the single HalfOpen trial is outstanding.
    pub trial_in_flight: bool,
    /// When the outstanding trial was admitted.
    pub trial_started: Option<DateTime<Utc>>,
}

impl ProviderHealthState {
    fn closed() -> Self {
        Self {
            status: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            trial_in_flight: false,
            trial_started: None,
        }
    }

    fn begin_trial(&mut self, now: DateTime<Utc>) {
        self.status = CircuitState::HalfOpen;
        self.trial_in_flight = true;
        self.trial_started = Some(now);
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait before testing recovery.
    pub recovery_timeout: Duration,
    /// How many failures an explicit upstream rate-limit signal counts as.
    pub rate_limit_failure_weight: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            rate_limit_failure_weight: 1,
        }
    }
}

fn elapsed_since(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    // Clock skew between processes can put `then` in the future
    (now - then).to_std().unwrap_or(Duration::ZERO)
}

/// Per-provider circuit breaker.
///
/// Every read-modify-write is a single [`StateStore::update`], so concurrent
/// requests never interleave inside one provider's transition. Store errors
/// fail open: the provider is treated as healthy and a warning is logged.
pub struct CircuitBreaker {
    store: Arc<dyn StateStore<ProviderHealthState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new in-memory circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create an in-memory circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self::with_store(Arc::new(InMemoryStateStore::new()), config)
    }

    /// Create a circuit breaker over an external state store.
    pub fn with_store(
        store: Arc<dyn StateStore<ProviderHealthState>>,
        config: CircuitBreakerConfig,
    ) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call to `provider` should be skipped.
    ///
    /// Performs the Open -> HalfOpen transition once the recovery timeout has
    /// elapsed; that call returns `false` and becomes the single trial. While
    /// the trial is outstanding every other caller gets `true`.
    ///
    /// A trial that never reports back (cancelled request) is abandoned after
    /// another recovery timeout and a new one is admitted.
    pub fn is_open(&self, provider: &ProviderId) -> bool {
        let now = Utc::now();
        let recovery_timeout = self.config.recovery_timeout;
        let mut skip = false;
        let mut transitioned = false;

        let result = self.store.update(provider.as_ref(), &mut |slot| {
            skip = false;
            transitioned = false;
            let Some(state) = slot.as_mut() else {
                return;
            };

            match state.status {
                CircuitState::Closed => {}
                CircuitState::Open => {
                    let recovered = state
                        .last_failure
                        .map_or(true, |at| elapsed_since(at, now) > recovery_timeout);
                    if recovered {
                        state.begin_trial(now);
                        transitioned = true;
                    } else {
                        skip = true;
                    }
                }
                CircuitState::HalfOpen => {
                    let stale_trial = state
                        .trial_started
                        .map_or(true, |at| elapsed_since(at, now) > recovery_timeout);
                    if state.trial_in_flight && !stale_trial {
                        skip = true;
                    } else {
                        state.begin_trial(now);
                    }
                }
            }
        });

        match result {
            Ok(_) => {
                if transitioned {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        provider
                    );
                }
                skip
            }
            Err(e) => {
                warn!(
                    "Circuit breaker: state store unavailable for '{}', allowing call: {}",
                    provider, e
                );
                false
            }
        }
    }

    /// Release a HalfOpen trial that was admitted but never made.
    ///
    /// Used when a later gate (rate limiter) stops the call after
    /// [`is_open`](Self::is_open) admitted it.
    pub fn release_trial(&self, provider: &ProviderId) {
        let result = self.store.update(provider.as_ref(), &mut |slot| {
            if let Some(state) = slot.as_mut() {
                if state.status == CircuitState::HalfOpen {
                    state.trial_in_flight = false;
                    state.trial_started = None;
                }
            }
        });
        if let Err(e) = result {
            warn!("Circuit breaker: failed to release trial for '{}': {}", provider, e);
        }
    }

    /// Record a successful request for a provider.
    ///
    /// Closes the circuit from any state and resets the failure count.
    pub fn record_success(&self, provider: &ProviderId) {
        let mut previous: Option<CircuitState> = None;

        let result = self.store.update(provider.as_ref(), &mut |slot| {
            previous = slot.as_ref().map(|s| s.status);
            // Nothing to reset for a provider that never failed
            if let Some(state) = slot.as_mut() {
                *state = ProviderHealthState::closed();
            }
        });

        match result {
            Ok(_) => match previous {
                Some(CircuitState::Closed) => {
                    debug!(
                        "Circuit breaker: success for '{}', failure count reset",
                        provider
                    );
                }
                Some(state) => {
                    info!(
                        "Circuit breaker: closing circuit for '{}' (was {})",
                        provider, state
                    );
                }
                None => {}
            },
            Err(e) => warn!(
                "Circuit breaker: failed to record success for '{}': {}",
                provider, e
            ),
        }
    }

    /// Record a failed request for a provider.
    ///
    /// Increments the failure count (by `rate_limit_failure_weight` for an
    /// explicit rate-limit error) and may open the circuit. In HalfOpen any
    /// failure immediately reopens it and restarts the recovery timer.
    pub fn record_failure(&self, provider: &ProviderId, error: &MarketDataError) {
        let weight = if error.is_rate_limited() {
            self.config.rate_limit_failure_weight
        } else {
            1
        };
        self.record_weighted_failure(provider, weight);
    }

    fn record_weighted_failure(&self, provider: &ProviderId, weight: u32) {
        if weight == 0 {
            // Ignored for counting, but a HalfOpen trial still has to end
            self.release_trial(provider);
            return;
        }

        let now = Utc::now();
        let threshold = self.config.failure_threshold;
        let mut transition: Option<(CircuitState, CircuitState)> = None;
        let mut count = 0;

        let result = self.store.update(provider.as_ref(), &mut |slot| {
            let state = slot.get_or_insert_with(ProviderHealthState::closed);
            let before = state.status;

            state.consecutive_failures = state.consecutive_failures.saturating_add(weight);
            state.last_failure = Some(now);

            match state.status {
                CircuitState::Closed => {
                    if state.consecutive_failures >= threshold {
                        state.status = CircuitState::Open;
                    }
                }
                CircuitState::HalfOpen => {
                    state.status = CircuitState::Open;
                    state.trial_in_flight = false;
                    state.trial_started = None;
                }
                CircuitState::Open => {}
            }

            count = state.consecutive_failures;
            transition = (before != state.status).then_some((before, state.status));
        });

        match result {
            Ok(_) => match transition {
                Some((CircuitState::HalfOpen, _)) => info!(
                    "Circuit breaker: reopening circuit for '{}' after failure in HalfOpen",
                    provider
                ),
                Some(_) => info!(
                    "Circuit breaker: opening circuit for '{}' after {} failures",
                    provider, count
                ),
                None => debug!(
                    "Circuit breaker: failure for '{}' ({}/{})",
                    provider, count, threshold
                ),
            },
            Err(e) => warn!(
                "Circuit breaker: failed to record failure for '{}': {}",
                provider, e
            ),
        }
    }

    /// Get the current state for a provider, without side effects.
    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        self.health(provider)
            .map(|s| s.status)
            .unwrap_or(CircuitState::Closed)
    }

    /// Get the failure count for a provider.
    pub fn failure_count(&self, provider: &ProviderId) -> u32 {
        self.health(provider)
            .map(|s| s.consecutive_failures)
            .unwrap_or(0)
    }

    /// Full persisted record, if the provider has ever failed.
    pub fn health(&self, provider: &ProviderId) -> Option<ProviderHealthState> {
        match self.store.get(provider.as_ref()) {
            Ok(state) => state,
            Err(e) => {
                warn!("Circuit breaker: failed to read state for '{}': {}", provider, e);
                None
            }
        }
    }

    /// Reset the circuit for a provider to Closed state.
    pub fn reset(&self, provider: &ProviderId) {
        info!(
            "Circuit breaker: manually resetting circuit for '{}'",
            provider
        );
        if let Err(e) = self.store.remove(provider.as_ref()) {
            warn!("Circuit breaker: failed to reset '{}': {}", provider, e);
        }
    }

    /// Reset all circuits to their initial state.
    pub fn reset_all(&self) {
        match self.store.clear() {
            Ok(()) => info!("Circuit breaker: all circuits reset"),
            Err(e) => warn!("Circuit breaker: failed to reset circuits: {}", e),
        }
    }

    /// Get metrics for all tracked providers.
    pub fn metrics(&self) -> Vec<CircuitMetrics> {
        match self.store.entries() {
            Ok(entries) => entries
                .into_iter()
                .map(|(provider, state)| CircuitMetrics {
                    provider,
                    state: state.status,
                    failure_count: state.consecutive_failures,
                    last_failure: state.last_failure,
                })
                .collect(),
            Err(e) => {
                warn!("Circuit breaker: failed to read metrics: {}", e);
                Vec::new()
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for a single circuit.
#[derive(Clone, Debug)]
pub struct CircuitMetrics {
    /// Provider identifier.
    pub provider: String,
    /// Current circuit state.
    pub state: CircuitState,
    /// Number of recorded failures.
    pub failure_count: u32,
    /// Time of the last failure.
    pub last_failure: Option<DateTime<Utc>>,
}
