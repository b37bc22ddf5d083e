//! Per-request record of what happened at each provider.
//!
//! Returned inside [`Resolution::Exhausted`](super::Resolution) and used for
//! the fallback and exhaustion log lines.

use crate::errors::MarketDataError;
use crate::models::ProviderId;

/// Why a provider was passed over without being called.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Circuit open, or its single recovery trial already taken.
    CircuitBreakerOpen,

    /// Call budget spent for now.
    RateLimited,

    /// Adapter does not offer the operation.
    NotSupported,

    /// Provider listed in the priority config but absent from the registry.
    NotRegistered,

    /// Already tried for these symbols in the batch pass.
    AlreadyTried,
}

/// One provider's entry in the walk.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<MarketDataError>,
    /// Provider answered but had nothing for the request
    pub empty: bool,
    pub success: bool,
}

/// Ordered attempts for one request.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    fn push(&mut self, provider_id: ProviderId) -> &mut ProviderAttempt {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            empty: false,
            success: false,
        });
        let last = self.attempts.len() - 1;
        &mut self.attempts[last]
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.push(provider_id).skipped = Some(reason);
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: MarketDataError) {
        self.push(provider_id).error = Some(error);
    }

    pub fn record_empty(&mut self, provider_id: ProviderId) {
        self.push(provider_id).empty = true;
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.push(provider_id).success = true;
    }

    /// One-line rendering such as `A: SKIPPED (RateLimited) -> B: SUCCESS`.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no providers".to_string();
        }
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else if a.empty {
                    format!("{}: EMPTY", a.provider_id)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }

    pub fn errors(&self) -> Vec<(&ProviderId, &MarketDataError)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.provider_id, e)))
            .collect()
    }

    /// Providers that were actually called, in order.
    pub fn called(&self) -> Vec<&ProviderId> {
        self.attempts
            .iter()
            .filter(|a| a.skipped.is_none())
            .map(|a| &a.provider_id)
            .collect()
    }
}
