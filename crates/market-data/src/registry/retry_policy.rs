//! Retry with exponential backoff for a single provider.
//!
//! The policy is plain data; [`RetryPolicy::run`] applies it to one adapter
//! call. Only errors whose [`RetryClass`](crate::errors::RetryClass) is
//! retryable are attempted again, every attempt runs under a timeout, and
//! every retry must get past the rate limiter first.

use std::future::Future;
use std::time::Duration;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::rate_limiter::RateLimiter;
use crate::errors::MarketDataError;
use crate::models::{FetchOutcome, ProviderId};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_JITTER_FRACTION: f64 = 0.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random jitter as a fraction of the delay.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_fraction: DEFAULT_JITTER_FRACTION,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff without jitter: `min(base_delay * 2^attempt, max_delay)`.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus uniform jitter in `[0, jitter_fraction * delay]`.
    ///
    /// The total never exceeds `max_delay`, which keeps successive delays
    /// non-decreasing once the cap is reached. A jitter fraction outside
    /// `[0, 1]` is clamped into it and NaN disables jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for_attempt(attempt);
        let max_jitter = delay.as_secs_f64() * self.jitter_fraction.clamp(0.0, 1.0);
        let jitter = if max_jitter.is_finite() && max_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..=max_jitter)
        } else {
            0.0
        };
        (delay + Duration::from_secs_f64(jitter)).min(self.max_delay)
    }

    /// Run `op` under this policy.
    ///
    /// Each attempt is bounded by `timeout`; an elapsed timeout becomes
    /// [`MarketDataError::Timeout`]. `Data` and `Empty` return immediately,
    /// as does a non-retryable failure. Before each retry the limiter is
    /// consulted again and a denial ends the loop with the last error.
    ///
    /// Never panics and never propagates: the final failure is returned as
    /// an outcome for the caller to record.
    pub async fn run<T, F, Fut>(
        &self,
        provider: &ProviderId,
        limiter: &RateLimiter,
        timeout: Duration,
        mut op: F,
    ) -> FetchOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchOutcome<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let outcome = match tokio::time::timeout(timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => FetchOutcome::Failure(MarketDataError::Timeout {
                    provider: provider.to_string(),
                }),
            };

            let error = match outcome {
                FetchOutcome::Failure(error) => error,
                settled => return settled,
            };

            if !error.retry_class().is_retryable() || attempt >= self.max_retries {
                return FetchOutcome::Failure(error);
            }

            let delay = self.delay_for_attempt(attempt);
            debug!(
                "Retrying '{}' in {:?} after {} (attempt {}/{})",
                provider,
                delay,
                error.code(),
                attempt + 1,
                self.max_retries
            );
            tokio::time::sleep(delay).await;

            if !limiter.check_limit(provider) {
                debug!("Retry for '{}' denied by rate limiter", provider);
                return FetchOutcome::Failure(error);
            }

            attempt += 1;
        }
    }
}
