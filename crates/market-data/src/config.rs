//! Orchestrator configuration.
//!
//! Every knob has a default. [`OrchestratorConfig::from_env`] overrides them
//! from `PRICEFEED_*` variables, loading a `.env` file first if present.
//! Absent or unparsable values keep the default.

use std::str::FromStr;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::models::Category;
use crate::registry::{CircuitBreakerConfig, RetryPolicy};

const DEFAULT_QUOTE_TTL: Duration = Duration::from_secs(180);
const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(600);
const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Cache lifetime and upstream timeout for one request category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    pub ttl: Duration,
    /// Applies when the provider does not declare its own timeout.
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
    pub quote: CategoryPolicy,
    pub history: CategoryPolicy,
    /// Worker pool size for individual calls in a batch.
    pub batch_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
            quote: CategoryPolicy {
                ttl: DEFAULT_QUOTE_TTL,
                timeout: DEFAULT_QUOTE_TIMEOUT,
            },
            history: CategoryPolicy {
                ttl: DEFAULT_HISTORY_TTL,
                timeout: DEFAULT_HISTORY_TIMEOUT,
            },
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

impl OrchestratorConfig {
    pub fn policy(&self, category: Category) -> &CategoryPolicy {
        match category {
            Category::Quote => &self.quote,
            Category::History => &self.history,
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load environment variables from .env file if available
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns per variable name.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        env.apply("PRICEFEED_MAX_RETRIES", &mut config.retry.max_retries);
        env.apply_millis("PRICEFEED_BASE_DELAY_MS", &mut config.retry.base_delay);
        env.apply_millis("PRICEFEED_MAX_DELAY_MS", &mut config.retry.max_delay);
        env.apply_fraction("PRICEFEED_JITTER_FRACTION", &mut config.retry.jitter_fraction);

        env.apply(
            "PRICEFEED_FAILURE_THRESHOLD",
            &mut config.breaker.failure_threshold,
        );
        env.apply_secs(
            "PRICEFEED_RECOVERY_TIMEOUT_SECS",
            &mut config.breaker.recovery_timeout,
        );
        env.apply(
            "PRICEFEED_RATE_LIMIT_FAILURE_WEIGHT",
            &mut config.breaker.rate_limit_failure_weight,
        );

        env.apply_secs("PRICEFEED_QUOTE_TTL_SECS", &mut config.quote.ttl);
        env.apply_secs("PRICEFEED_QUOTE_TIMEOUT_SECS", &mut config.quote.timeout);
        env.apply_secs("PRICEFEED_HISTORY_TTL_SECS", &mut config.history.ttl);
        env.apply_secs("PRICEFEED_HISTORY_TIMEOUT_SECS", &mut config.history.timeout);

        env.apply("PRICEFEED_BATCH_CONCURRENCY", &mut config.batch_concurrency);
        if config.batch_concurrency == 0 {
            warn!("PRICEFEED_BATCH_CONCURRENCY must be at least 1, using 1");
            config.batch_concurrency = 1;
        }

        config
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn apply<T: FromStr>(&self, key: &str, target: &mut T) {
        let Some(raw) = (self.lookup)(key) else {
            return;
        };
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring invalid value for {}: '{}'", key, raw),
        }
    }

    /// Like `apply`, but only accepts finite values in `[0, 1]`.
    fn apply_fraction(&self, key: &str, target: &mut f64) {
        let mut value = *target;
        self.apply(key, &mut value);
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            *target = value;
        } else {
            warn!("Ignoring out-of-range value for {}: {}", key, value);
        }
    }

    fn apply_secs(&self, key: &str, target: &mut Duration) {
        let mut secs = target.as_secs();
        self.apply(key, &mut secs);
        *target = Duration::from_secs(secs);
    }

    fn apply_millis(&self, key: &str, target: &mut Duration) {
        let mut millis = u64::try_from(target.as_millis()).unwrap_or(u64::MAX);
        self.apply(key, &mut millis);
        *target = Duration::from_millis(millis);
    }
}
