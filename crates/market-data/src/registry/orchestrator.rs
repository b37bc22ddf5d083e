//! Request orchestration across market data providers.
//!
//! For one request the orchestrator:
//! 1. Serves a fresh cache entry if there is one
//! 2. Walks the providers for the category, highest priority first
//! 3. Skips providers whose circuit is open or whose budget is spent
//! 4. Calls the adapter through the retry policy, under a timeout
//! 5. Validates, caches and returns the first good result
//!
//! Failures and empty answers are recorded on the circuit breaker and the
//! walk continues. Running out of providers is a normal outcome reported
//! with diagnostics, never an error.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use super::provider_registry::{
    PriorityConfig, ProviderDescriptor, ProviderLookup, StaticProviderRegistry,
};
use super::rate_limiter::RateLimiter;
use super::skip_reason::{FetchDiagnostics, SkipReason};
use super::validator::DataValidator;
use crate::cache::{cache_key, MarketDataCache, CACHE_SOURCE};
use crate::config::OrchestratorConfig;
use crate::errors::MarketDataError;
use crate::models::{
    CanonicalQuote, Category, FetchOutcome, HistoryResult, HistorySeries, HistoryWindow,
    ProviderId,
};
use crate::provider::{BinanceProvider, CoinGeckoProvider, MarketDataProvider};

/// Terminal state of a resolution.
#[derive(Clone, Debug)]
pub enum Resolution<T> {
    Success {
        data: T,
        /// Provider id, or `"cache"` for a cache hit.
        source: String,
    },
    Exhausted { diagnostics: FetchDiagnostics },
}

impl<T> Resolution<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Success { source, .. } => Some(source),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Per-provider health snapshot.
#[derive(Clone, Debug)]
pub struct ProviderStatus {
    pub provider_id: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Result of the adapter's own health check.
    pub healthy: bool,
}

struct Request<'a> {
    category: Category,
    symbol: &'a str,
    params: Option<String>,
    /// Read the cache before calling providers. Results are written either way.
    use_cache: bool,
    /// Providers that already had their chance for this symbol.
    exclude: &'a HashSet<String>,
}

/// Multi-provider fetcher with caching, rate limiting and circuit breaking.
pub struct MarketDataOrchestrator {
    registry: Arc<dyn ProviderLookup>,
    priorities: PriorityConfig,
    circuit_breaker: CircuitBreaker,
    rate_limiter: RateLimiter,
    cache: MarketDataCache,
    validator: DataValidator,
    config: OrchestratorConfig,
}

impl MarketDataOrchestrator {
    /// Create an orchestrator with in-memory state and cache.
    ///
    /// Rate budgets are seeded from each registered adapter's
    /// `rate_budget()`.
    pub fn new(
        registry: Arc<dyn ProviderLookup>,
        priorities: PriorityConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let orchestrator = Self {
            registry,
            priorities,
            circuit_breaker: CircuitBreaker::with_config(config.breaker.clone()),
            rate_limiter: RateLimiter::new(),
            cache: MarketDataCache::in_memory(),
            validator: DataValidator::new(),
            config,
        };
        orchestrator.seed_budgets();
        orchestrator
    }

    /// Binance first for quotes, CoinGecko first for history.
    pub fn with_reference_providers(
        config: OrchestratorConfig,
        coingecko_api_key: Option<String>,
    ) -> Self {
        let binance: Arc<dyn MarketDataProvider> = Arc::new(BinanceProvider::new());
        let coingecko: Arc<dyn MarketDataProvider> = Arc::new(match coingecko_api_key {
            Some(key) => CoinGeckoProvider::new().with_api_key(key),
            None => CoinGeckoProvider::new(),
        });

        let priorities = PriorityConfig::from_descriptors(&[
            ProviderDescriptor::new(binance.id(), 10, &[Category::Quote]),
            ProviderDescriptor::new(binance.id(), 5, &[Category::History]),
            ProviderDescriptor::new(coingecko.id(), 5, &[Category::Quote]),
            ProviderDescriptor::new(coingecko.id(), 10, &[Category::History]),
        ]);
        let registry = StaticProviderRegistry::new(vec![binance, coingecko]);

        Self::new(Arc::new(registry), priorities, config)
    }

    /// Replace the circuit breaker (e.g. one backed by a shared store).
    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    /// Replace the rate limiter. Adapter budgets are seeded into it.
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self.seed_budgets();
        self
    }

    pub fn with_cache(mut self, cache: MarketDataCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_validator(mut self, validator: DataValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn seed_budgets(&self) {
        for provider in self.registry.all_providers() {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            self.rate_limiter.configure(&provider_id, provider.rate_budget());
        }
    }

    /// Latest quote for `symbol`, or `None` if every provider came up empty.
    pub async fn get_quote(&self, symbol: &str) -> Option<CanonicalQuote> {
        self.resolve_quote(symbol).await.into_data()
    }

    /// Price history for `symbol` over `window`.
    ///
    /// With `use_cache` false the cache is not read, but a fresh result
    /// still replaces the cached one.
    pub async fn get_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
        use_cache: bool,
    ) -> Option<HistoryResult> {
        match self.resolve_history(symbol, window, use_cache).await {
            Resolution::Success { data, source } => Some(HistoryResult {
                series: data,
                provider_source: source,
            }),
            Resolution::Exhausted { .. } => None,
        }
    }

    pub async fn resolve_quote(&self, symbol: &str) -> Resolution<CanonicalQuote> {
        let exclude = HashSet::new();
        self.resolve_quote_inner(symbol, true, &exclude).await
    }

    pub async fn resolve_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
        use_cache: bool,
    ) -> Resolution<HistorySeries> {
        let exclude = HashSet::new();
        let request = Request {
            category: Category::History,
            symbol,
            params: Some(window.cache_params()),
            use_cache,
            exclude: &exclude,
        };

        self.resolve(
            request,
            |provider| async move { provider.fetch_history(symbol, window).await },
            |series| self.validator.validate_history(symbol, series),
        )
        .await
    }

    async fn resolve_quote_inner(
        &self,
        symbol: &str,
        use_cache: bool,
        exclude: &HashSet<String>,
    ) -> Resolution<CanonicalQuote> {
        let request = Request {
            category: Category::Quote,
            symbol,
            params: None,
            use_cache,
            exclude,
        };

        self.resolve(
            request,
            |provider| async move { provider.fetch_quote(symbol).await },
            |quote| self.validator.validate_quote(quote),
        )
        .await
    }

    /// Quotes for many symbols at once.
    ///
    /// Cached symbols are answered first. The rest go to batch-capable
    /// providers in priority order, then whatever is still missing is
    /// fetched one symbol at a time with bounded concurrency, skipping the
    /// providers the batch pass already tried. Symbols nobody could serve
    /// are left out of the map.
    pub async fn get_batch_quotes(&self, symbols: &[String]) -> HashMap<String, CanonicalQuote> {
        let mut results: HashMap<String, CanonicalQuote> = HashMap::new();
        let mut remaining: Vec<String> = Vec::new();

        for symbol in symbols {
            if results.contains_key(symbol) || remaining.contains(symbol) {
                continue;
            }
            let key = cache_key(Category::Quote, symbol, None);
            match self.cache.get::<CanonicalQuote>(&key).await {
                Some(quote) => {
                    results.insert(symbol.clone(), quote);
                }
                None => remaining.push(symbol.clone()),
            }
        }

        if remaining.is_empty() {
            return results;
        }

        let tried = self.batch_pass(&mut remaining, &mut results).await;

        if remaining.is_empty() {
            return results;
        }

        let concurrency = self.config.batch_concurrency.max(1);
        let individual: Vec<(String, Resolution<CanonicalQuote>)> = stream::iter(remaining)
            .map(|symbol| {
                let tried = &tried;
                async move {
                    let resolution = self.resolve_quote_inner(&symbol, false, tried).await;
                    (symbol, resolution)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (symbol, resolution) in individual {
            if let Some(quote) = resolution.into_data() {
                results.insert(symbol, quote);
            }
        }

        results
    }

    /// One batch call per batch-capable provider until nothing is missing.
    ///
    /// Returns the ids the individual pass should skip.
    async fn batch_pass(
        &self,
        remaining: &mut Vec<String>,
        results: &mut HashMap<String, CanonicalQuote>,
    ) -> HashSet<String> {
        let mut tried: HashSet<String> = HashSet::new();
        let mut diagnostics = FetchDiagnostics::new();
        let ttl = self.config.quote.ttl;

        for provider_id in self.priorities.ordered(Category::Quote) {
            if remaining.is_empty() {
                break;
            }

            let Some(provider) = self.lookup(&provider_id, &mut diagnostics) else {
                // Already charged once; individual calls must not charge it again
                tried.insert(provider_id.to_string());
                continue;
            };
            let capabilities = provider.capabilities();
            if !capabilities.supports_batch || !capabilities.supports(Category::Quote) {
                continue;
            }
            let Some(timeout) =
                self.admit(&provider, &provider_id, Category::Quote, &mut diagnostics)
            else {
                continue;
            };

            let requested = remaining.clone();
            let outcome = self
                .config
                .retry
                .run(&provider_id, &self.rate_limiter, timeout, || {
                    let provider = provider.clone();
                    let requested = &requested;
                    async move { provider.fetch_batch_quotes(requested).await }
                })
                .await;

            match outcome {
                FetchOutcome::Data(quotes) => {
                    tried.insert(provider_id.to_string());
                    let mut accepted = 0usize;
                    for (symbol, quote) in quotes {
                        if !remaining.contains(&symbol) {
                            continue;
                        }
                        if let Err(e) = self.validator.validate_quote(&quote) {
                            warn!(
                                "Rejected batch quote for '{}' from '{}': {}",
                                symbol, provider_id, e
                            );
                            continue;
                        }
                        let key = cache_key(Category::Quote, &symbol, None);
                        self.cache.set(&key, &quote, ttl).await;
                        results.insert(symbol, quote);
                        accepted += 1;
                    }
                    remaining.retain(|symbol| !results.contains_key(symbol));

                    if accepted > 0 {
                        debug!(
                            "Batch from '{}' served {} symbols, {} still missing",
                            provider_id,
                            accepted,
                            remaining.len()
                        );
                        self.circuit_breaker.record_success(&provider_id);
                    } else {
                        let error = MarketDataError::data(&provider_id, "no valid quotes in batch");
                        self.circuit_breaker.record_failure(&provider_id, &error);
                        diagnostics.record_error(provider_id, error);
                    }
                }
                FetchOutcome::Empty => {
                    // Nothing for the batch as a whole says little about each
                    // symbol, so the individual pass still asks this provider.
                    debug!("Batch from '{}' came back empty", provider_id);
                    self.circuit_breaker.release_trial(&provider_id);
                    diagnostics.record_empty(provider_id);
                }
                FetchOutcome::Failure(error) => {
                    if matches!(error, MarketDataError::NotSupported { .. }) {
                        self.circuit_breaker.release_trial(&provider_id);
                        diagnostics.record_skip(provider_id, SkipReason::NotSupported);
                        continue;
                    }
                    tried.insert(provider_id.to_string());
                    debug!("Batch call to '{}' failed: {}", provider_id, error);
                    self.circuit_breaker.record_failure(&provider_id, &error);
                    diagnostics.record_error(provider_id, error);
                }
            }
        }

        if !diagnostics.attempts.is_empty() {
            debug!("Batch pass: {}", diagnostics.summary());
        }
        tried
    }

    /// Look up an adapter. A missing one counts as a failed call.
    fn lookup(
        &self,
        provider_id: &ProviderId,
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<Arc<dyn MarketDataProvider>> {
        if let Some(provider) = self.registry.get_provider(provider_id) {
            return Some(provider);
        }

        if self.circuit_breaker.is_open(provider_id) {
            diagnostics.record_skip(provider_id.clone(), SkipReason::CircuitBreakerOpen);
            return None;
        }

        warn!("Provider '{}' is not registered", provider_id);
        let error = MarketDataError::ProviderUnavailable {
            provider: provider_id.to_string(),
        };
        self.circuit_breaker.record_failure(provider_id, &error);
        diagnostics.record_error(provider_id.clone(), error);
        None
    }

    /// Breaker and limiter gates. Returns the call timeout when admitted.
    fn admit(
        &self,
        provider: &Arc<dyn MarketDataProvider>,
        provider_id: &ProviderId,
        category: Category,
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<Duration> {
        if self.circuit_breaker.is_open(provider_id) {
            debug!("Circuit breaker open for '{}', skipping", provider_id);
            diagnostics.record_skip(provider_id.clone(), SkipReason::CircuitBreakerOpen);
            return None;
        }

        if !self.rate_limiter.check_limit(provider_id) {
            debug!("Rate limit reached for '{}', skipping", provider_id);
            self.circuit_breaker.release_trial(provider_id);
            diagnostics.record_skip(provider_id.clone(), SkipReason::RateLimited);
            return None;
        }

        Some(
            provider
                .timeout()
                .unwrap_or(self.config.policy(category).timeout),
        )
    }

    async fn resolve<T, F, Fut, V>(
        &self,
        request: Request<'_>,
        fetch: F,
        validate: V,
    ) -> Resolution<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = FetchOutcome<T>>,
        V: Fn(&T) -> Result<(), MarketDataError>,
    {
        let Request {
            category,
            symbol,
            params,
            use_cache,
            exclude,
        } = request;
        let key = cache_key(category, symbol, params.as_deref());

        if use_cache {
            if let Some(data) = self.cache.get::<T>(&key).await {
                debug!("Cache hit for '{}'", key);
                return Resolution::Success {
                    data,
                    source: CACHE_SOURCE.to_string(),
                };
            }
        }

        let mut diagnostics = FetchDiagnostics::new();
        let ttl = self.config.policy(category).ttl;

        for provider_id in self.priorities.ordered(category) {
            if exclude.contains(provider_id.as_ref()) {
                diagnostics.record_skip(provider_id, SkipReason::AlreadyTried);
                continue;
            }

            let Some(provider) = self.lookup(&provider_id, &mut diagnostics) else {
                continue;
            };

            if !provider.capabilities().supports(category) {
                diagnostics.record_skip(provider_id, SkipReason::NotSupported);
                continue;
            }

            let Some(timeout) = self.admit(&provider, &provider_id, category, &mut diagnostics)
            else {
                continue;
            };

            debug!("Fetching {} '{}' from '{}'", category, symbol, provider_id);
            let outcome = self
                .config
                .retry
                .run(&provider_id, &self.rate_limiter, timeout, || {
                    fetch(provider.clone())
                })
                .await;

            match outcome {
                FetchOutcome::Data(data) => {
                    if let Err(e) = validate(&data) {
                        warn!(
                            "Rejected {} for '{}' from '{}': {}",
                            category, symbol, provider_id, e
                        );
                        self.circuit_breaker.record_failure(&provider_id, &e);
                        diagnostics.record_error(provider_id, e);
                        continue;
                    }

                    self.cache.set(&key, &data, ttl).await;
                    self.circuit_breaker.record_success(&provider_id);

                    if diagnostics.called().is_empty() {
                        debug!("Served {} '{}' from '{}'", category, symbol, provider_id);
                    } else {
                        info!(
                            "Served {} '{}' from fallback '{}' after: {}",
                            category,
                            symbol,
                            provider_id,
                            diagnostics.summary()
                        );
                    }

                    return Resolution::Success {
                        data,
                        source: provider_id.to_string(),
                    };
                }
                FetchOutcome::Empty => {
                    debug!("'{}' had no {} for '{}'", provider_id, category, symbol);
                    let error = MarketDataError::data(&provider_id, "empty response");
                    self.circuit_breaker.record_failure(&provider_id, &error);
                    diagnostics.record_empty(provider_id);
                }
                FetchOutcome::Failure(error) => {
                    if matches!(error, MarketDataError::NotSupported { .. }) {
                        self.circuit_breaker.release_trial(&provider_id);
                        diagnostics.record_skip(provider_id, SkipReason::NotSupported);
                        continue;
                    }
                    debug!(
                        "'{}' failed {} for '{}': {}",
                        provider_id, category, symbol, error
                    );
                    self.circuit_breaker.record_failure(&provider_id, &error);
                    diagnostics.record_error(provider_id, error);
                }
            }
        }

        warn!(
            "No provider could serve {} '{}': {}",
            category,
            symbol,
            diagnostics.summary()
        );
        Resolution::Exhausted { diagnostics }
    }

    /// Circuit state, failure count and health check for every registered
    /// provider. Health checks run concurrently under the quote timeout.
    pub async fn provider_status(&self) -> Vec<ProviderStatus> {
        let timeout = self.config.quote.timeout;
        let checks = self.registry.all_providers().into_iter().map(|provider| async move {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            let healthy = tokio::time::timeout(timeout, provider.health_check())
                .await
                .unwrap_or(false);
            ProviderStatus {
                provider_id: provider_id.to_string(),
                state: self.circuit_breaker.state(&provider_id),
                failure_count: self.circuit_breaker.failure_count(&provider_id),
                healthy,
            }
        });

        futures::future::join_all(checks).await
    }

    /// Drop every cached quote and history entry for `symbol`.
    pub async fn invalidate(&self, symbol: &str) {
        for category in Category::ALL {
            self.cache.invalidate_symbol(category, symbol).await;
        }
    }
}
