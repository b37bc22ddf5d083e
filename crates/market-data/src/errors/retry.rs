/// Classification for retry policy.
///
/// Used by [`RetryPolicy`](crate::registry::RetryPolicy) to decide whether a
/// failed adapter call is worth another attempt after a backoff delay.
///
/// # Behavior Summary
///
/// | Class | Backoff and retry? | Record Circuit Breaker Failure on exhaustion? |
/// |-------|--------------------|-----------------------------------------------|
/// | `RateLimited` | Yes | Yes (weighted, see `CircuitBreakerConfig`) |
/// | `Network` | Yes | Yes |
/// | `Other` | No | Depends on the error |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The provider explicitly told us to slow down (HTTP 429).
    RateLimited,

    /// Transient transport failure: connection error, reset, timeout.
    Network,

    /// Anything else. Retrying the same call will not change the outcome.
    Other,
}

impl RetryClass {
    /// Whether errors of this class go through the backoff path.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Network)
    }
}
