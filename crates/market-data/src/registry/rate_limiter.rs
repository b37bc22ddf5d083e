//! Token bucket rate limiter for market data providers.
//!
//! Implements per-provider rate limiting using the token bucket algorithm.
//! Each provider's bucket holds up to `max_calls` tokens and refills at
//! `max_calls / window`, so a provider can burst its whole budget and is
//! then paced. Checks never wait: a denied call is skipped by the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::state_store::{InMemoryStateStore, StateStore};
use crate::models::ProviderId;
use crate::provider::RateBudget;

/// Persisted token bucket for a single provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenBucket {
    /// Current number of available tokens.
    pub tokens: f64,
    /// Last time the bucket was refilled.
    pub last_refill: DateTime<Utc>,
}

impl TokenBucket {
    fn full(budget: &RateBudget, now: DateTime<Utc>) -> Self {
        Self {
            tokens: f64::from(budget.max_calls),
            last_refill: now,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self, budget: &RateBudget, now: DateTime<Utc>) {
        let capacity = f64::from(budget.max_calls);
        let rate = budget.refill_per_sec();

        if rate.is_infinite() {
            self.tokens = capacity;
        } else {
            let elapsed = (now - self.last_refill)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .as_secs_f64();
            self.tokens = (self.tokens + elapsed * rate).min(capacity);
        }
        // Never move the clock backwards on skewed writers
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Take one token if available.
    fn try_take(&mut self, budget: &RateBudget, now: DateTime<Utc>) -> bool {
        self.refill(budget, now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&self, budget: &RateBudget) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let rate = budget.refill_per_sec();
        if rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / rate)
    }
}

/// Token bucket rate limiter for multiple providers.
///
/// Buckets live in an injected [`StateStore`]; budgets are process-local
/// configuration. Providers without a configured budget get
/// [`RateBudget::default`]. If the store fails the call is allowed.
pub struct RateLimiter {
    store: Arc<dyn StateStore<TokenBucket>>,
    /// Per-provider budgets.
    budgets: Mutex<HashMap<String, RateBudget>>,
}

impl RateLimiter {
    /// Create a new in-memory rate limiter.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStateStore::new()))
    }

    /// Create a rate limiter over an external state store.
    pub fn with_store(store: Arc<dyn StateStore<TokenBucket>>) -> Self {
        Self {
            store,
            budgets: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the budgets mutex, recovering from poison if necessary.
    fn lock_budgets(&self) -> MutexGuard<'_, HashMap<String, RateBudget>> {
        self.budgets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter budgets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure the budget for a specific provider.
    ///
    /// The provider's bucket is reset to the new capacity.
    pub fn configure(&self, provider: &ProviderId, budget: RateBudget) {
        self.lock_budgets().insert(provider.to_string(), budget);
        self.reset(provider);
    }

    pub fn budget(&self, provider: &ProviderId) -> RateBudget {
        self.lock_budgets()
            .get(provider.as_ref())
            .copied()
            .unwrap_or_default()
    }

    /// Consume one call from the provider's budget.
    ///
    /// Returns `false` when the budget is exhausted. Never waits.
    pub fn check_limit(&self, provider: &ProviderId) -> bool {
        let budget = self.budget(provider);
        let now = Utc::now();
        let mut allowed = false;

        let result = self.store.update(provider.as_ref(), &mut |slot| {
            let bucket = slot.get_or_insert_with(|| TokenBucket::full(&budget, now));
            allowed = bucket.try_take(&budget, now);
        });

        match result {
            Ok(_) => {
                if !allowed {
                    debug!("Rate limiter: budget exhausted for '{}'", provider);
                }
                allowed
            }
            Err(e) => {
                warn!(
                    "Rate limiter: state store unavailable for '{}', allowing call: {}",
                    provider, e
                );
                true
            }
        }
    }

    /// Get the remaining tokens for a provider.
    pub fn remaining_tokens(&self, provider: &ProviderId) -> f64 {
        let budget = self.budget(provider);
        match self.store.get(provider.as_ref()) {
            Ok(Some(mut bucket)) => {
                bucket.refill(&budget, Utc::now());
                bucket.tokens
            }
            Ok(None) => f64::from(budget.max_calls),
            Err(e) => {
                warn!("Rate limiter: failed to read bucket for '{}': {}", provider, e);
                f64::from(budget.max_calls)
            }
        }
    }

    /// How long until the next call would be allowed.
    pub fn time_until_available(&self, provider: &ProviderId) -> Duration {
        let budget = self.budget(provider);
        match self.store.get(provider.as_ref()) {
            Ok(Some(mut bucket)) => {
                bucket.refill(&budget, Utc::now());
                bucket.time_until_available(&budget)
            }
            _ => Duration::ZERO,
        }
    }

    /// Reset the rate limiter for a provider.
    pub fn reset(&self, provider: &ProviderId) {
        if let Err(e) = self.store.remove(provider.as_ref()) {
            warn!("Rate limiter: failed to reset '{}': {}", provider, e);
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_token_bucket_take() {
        let budget = RateBudget::per_minute(10);
        let now = Utc::now();
        let mut bucket = TokenBucket::full(&budget, now);

        // Should be able to take up to capacity tokens immediately
        for _ in 0..10 {
            assert!(bucket.try_take(&budget, now));
        }

        // Next take should fail (no tokens left)
        assert!(!bucket.try_take(&budget, now));
        assert!(bucket.time_until_available(&budget) > Duration::ZERO);
    }

    #[test]
    fn test_token_bucket_refill() {
        let budget = RateBudget::per_minute(60); // 1 token/second
        let start = Utc::now();
        let mut bucket = TokenBucket::full(&budget, start);
        bucket.tokens = 0.0;

        assert!(!bucket.try_take(&budget, start));
        assert!(bucket.try_take(&budget, start + chrono::Duration::seconds(2)));
        assert!(bucket.tokens < 1.5);
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let budget = RateBudget::new(3, Duration::from_secs(1));
        let start = Utc::now();
        let mut bucket = TokenBucket::full(&budget, start);
        bucket.refill(&budget, start + chrono::Duration::hours(1));
        assert!((bucket.tokens - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_budget_applies_to_unknown_providers() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("TEST_PROVIDER");

        let capacity = RateBudget::default().max_calls as usize;
        for _ in 0..capacity {
            assert!(limiter.check_limit(&provider));
        }
        assert!(!limiter.check_limit(&provider));
    }

    #[test]
    fn test_configured_budget() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("CUSTOM_PROVIDER");

        limiter.configure(&provider, RateBudget::per_minute(5));

        for _ in 0..5 {
            assert!(limiter.check_limit(&provider));
        }
        assert!(!limiter.check_limit(&provider));
        assert!(limiter.time_until_available(&provider) > Duration::ZERO);
    }

    #[test]
    fn test_per_provider_isolation() {
        let limiter = RateLimiter::new();
        let provider_a: ProviderId = Cow::Borrowed("PROVIDER_A");
        let provider_b: ProviderId = Cow::Borrowed("PROVIDER_B");
        limiter.configure(&provider_a, RateBudget::per_minute(1));

        assert!(limiter.check_limit(&provider_a));
        assert!(!limiter.check_limit(&provider_a));

        // Provider B should still have tokens
        assert!(limiter.check_limit(&provider_b));
    }

    #[test]
    fn test_reset_restores_capacity() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("RESET_PROVIDER");
        limiter.configure(&provider, RateBudget::per_minute(1));

        assert!(limiter.check_limit(&provider));
        assert!(!limiter.check_limit(&provider));

        limiter.reset(&provider);
        assert!(limiter.check_limit(&provider));
    }

    #[test]
    fn test_remaining_tokens() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("REMAINING_PROVIDER");
        limiter.configure(&provider, RateBudget::new(10, Duration::from_secs(3600)));

        assert!((limiter.remaining_tokens(&provider) - 10.0).abs() < 0.01);

        limiter.check_limit(&provider);
        limiter.check_limit(&provider);

        assert!((limiter.remaining_tokens(&provider) - 8.0).abs() < 0.01);
    }

    #[test]
    fn test_stored_bucket_refills_over_time() {
        let store: Arc<InMemoryStateStore<TokenBucket>> = Arc::new(InMemoryStateStore::new());
        let limiter = RateLimiter::with_store(store.clone());
        let provider: ProviderId = Cow::Borrowed("SLOW_PROVIDER");
        limiter.configure(&provider, RateBudget::per_minute(60));

        // Drained a second and a half ago
        store
            .set(
                "SLOW_PROVIDER",
                TokenBucket {
                    tokens: 0.0,
                    last_refill: Utc::now() - chrono::Duration::milliseconds(1500),
                },
            )
            .unwrap();

        assert!(limiter.check_limit(&provider));
        assert!(!limiter.check_limit(&provider));
    }

    #[test]
    fn test_zero_window_is_unlimited() {
        let limiter = RateLimiter::new();
        let provider: ProviderId = Cow::Borrowed("UNLIMITED");
        limiter.configure(&provider, RateBudget::new(1, Duration::ZERO));

        for _ in 0..100 {
            assert!(limiter.check_limit(&provider));
        }
    }
}
