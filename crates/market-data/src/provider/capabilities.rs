//! Provider capabilities and call budgets.
//!
//! This module defines structures for describing what a market data provider
//! can do and how often it may be called.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Category;

/// Describes the capabilities of a market data provider.
///
/// Used by the orchestrator to decide which request kinds may be routed
/// to a provider and whether a batch pass is worth attempting.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Request categories this provider serves.
    pub categories: &'static [Category],

    /// Whether `fetch_batch_quotes` is implemented natively.
    pub supports_batch: bool,
}

impl ProviderCapabilities {
    pub fn supports(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Call budget for a provider: at most `max_calls` in any `window`.
///
/// Enforced by the rate limiter as a token bucket with capacity `max_calls`
/// that refills at `max_calls / window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
    /// Maximum calls in one window (bucket capacity).
    pub max_calls: u32,

    /// Length of the window.
    pub window: Duration,
}

impl RateBudget {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self { max_calls, window }
    }

    /// Budget of `max_calls` per minute.
    pub fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(60))
    }

    /// Token refill rate in calls per second.
    pub fn refill_per_sec(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            return f64::INFINITY;
        }
        f64::from(self.max_calls) / secs
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refill_rate() {
        assert!((RateBudget::per_minute(60).refill_per_sec() - 1.0).abs() < f64::EPSILON);
        assert!((RateBudget::new(10, Duration::from_secs(1)).refill_per_sec() - 10.0).abs() < 1e-9);
        assert!(RateBudget::new(5, Duration::ZERO).refill_per_sec().is_infinite());
    }

    #[test]
    fn test_supports_category() {
        let caps = ProviderCapabilities {
            categories: &[Category::Quote],
            supports_batch: false,
        };
        assert!(caps.supports(Category::Quote));
        assert!(!caps.supports(Category::History));
    }
}
