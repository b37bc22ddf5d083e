//! End-to-end tests for provider selection, fallback, caching and batching.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pricefeed_market_data::{
    CacheBackend, CanonicalQuote, Category, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    FetchOutcome, HistoryPoint, HistorySeries, HistoryWindow, MarketDataCache, MarketDataError,
    MarketDataOrchestrator, MarketDataProvider, MokaCacheBackend, OrchestratorConfig,
    PriorityConfig, ProviderCapabilities, ProviderDescriptor, ProviderId, RateBudget,
    Resolution, RetryPolicy, SqliteStateStore, StaticProviderRegistry,
};
use pricefeed_market_data::registry::ProviderHealthState;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const ALL: &[Category] = &[Category::Quote, Category::History];

// =============================================================================
// Mock provider
// =============================================================================

struct MockProvider {
    id: &'static str,
    price: Decimal,
    categories: &'static [Category],
    supports_batch: bool,
    empty_batch: bool,
    budget: RateBudget,
    timeout: Option<Duration>,
    delay: Option<Duration>,
    failing: AtomicBool,
    rate_limited: bool,
    fail_symbols: Vec<String>,
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MockProvider {
    fn new(id: &'static str, price: Decimal) -> Self {
        Self {
            id,
            price,
            categories: ALL,
            supports_batch: false,
            empty_batch: false,
            budget: RateBudget::per_minute(1000),
            timeout: None,
            delay: None,
            failing: AtomicBool::new(false),
            rate_limited: false,
            fail_symbols: Vec::new(),
            calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    fn rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    fn with_batch(mut self) -> Self {
        self.supports_batch = true;
        self
    }

    /// Batch calls always answer "nothing", as when one symbol poisons the request.
    fn with_empty_batch(mut self) -> Self {
        self.supports_batch = true;
        self.empty_batch = true;
        self
    }

    fn serving(mut self, categories: &'static [Category]) -> Self {
        self.categories = categories;
        self
    }

    fn with_budget(mut self, budget: RateBudget) -> Self {
        self.budget = budget;
        self
    }

    fn with_delay(mut self, delay: Duration, timeout: Duration) -> Self {
        self.delay = Some(delay);
        self.timeout = Some(timeout);
        self
    }

    fn failing_for(mut self, symbols: &[&str]) -> Self {
        self.fail_symbols = symbols.iter().map(|s| s.to_string()).collect();
        self
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn error(&self) -> MarketDataError {
        if self.rate_limited {
            MarketDataError::RateLimited {
                provider: self.id.to_string(),
            }
        } else {
            MarketDataError::Transport {
                provider: self.id.to_string(),
                message: "connection reset".to_string(),
            }
        }
    }

    fn fails_for(&self, symbol: &str) -> bool {
        self.failing.load(Ordering::SeqCst) || self.fail_symbols.iter().any(|s| s == symbol)
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            categories: self.categories,
            supports_batch: self.supports_batch,
        }
    }

    fn rate_budget(&self) -> RateBudget {
        self.budget
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn fetch_quote(&self, symbol: &str) -> FetchOutcome<CanonicalQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fails_for(symbol) {
            return FetchOutcome::Failure(self.error());
        }
        FetchOutcome::Data(CanonicalQuote::new(symbol, self.price, Utc::now(), self.id))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
    ) -> FetchOutcome<HistorySeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails_for(symbol) {
            return FetchOutcome::Failure(self.error());
        }
        let now = Utc::now();
        let points = (0..window.num_days())
            .map(|day| {
                HistoryPoint::new(
                    now - chrono::Duration::days(i64::from(day)),
                    self.price + Decimal::from(day),
                )
            })
            .collect();
        match HistorySeries::from_points(points) {
            Some(series) => FetchOutcome::Data(series),
            None => FetchOutcome::Empty,
        }
    }

    async fn fetch_batch_quotes(
        &self,
        symbols: &[String],
    ) -> FetchOutcome<HashMap<String, CanonicalQuote>> {
        if !self.supports_batch {
            return FetchOutcome::Failure(MarketDataError::NotSupported {
                operation: "batch_quotes".to_string(),
                provider: self.id.to_string(),
            });
        }
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.empty_batch {
            return FetchOutcome::Empty;
        }
        let quotes = symbols
            .iter()
            .filter(|s| !self.fails_for(s))
            .map(|s| {
                (
                    s.clone(),
                    CanonicalQuote::new(s.as_str(), self.price, Utc::now(), self.id),
                )
            })
            .collect();
        FetchOutcome::Data(quotes)
    }
}

// =============================================================================
// Recording cache backend
// =============================================================================

#[derive(Default)]
struct RecordingBackend {
    inner: MokaCacheBackend,
    writes: Mutex<Vec<(String, Duration)>>,
}

impl RecordingBackend {
    fn ttl_for(&self, key: &str) -> Option<Duration> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl CacheBackend for RecordingBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, MarketDataError> {
        self.inner.get(key).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), MarketDataError> {
        self.writes.lock().unwrap().push((key.to_string(), ttl));
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<(), MarketDataError> {
        self.inner.remove(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), MarketDataError> {
        self.inner.remove_prefix(prefix).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_fraction: 0.1,
        },
        breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            rate_limit_failure_weight: 1,
        },
        ..OrchestratorConfig::default()
    }
}

fn build(
    providers: &[(Arc<MockProvider>, i32)],
    config: OrchestratorConfig,
) -> MarketDataOrchestrator {
    let descriptors: Vec<ProviderDescriptor> = providers
        .iter()
        .map(|(p, priority)| ProviderDescriptor::for_provider(p.as_ref(), *priority))
        .collect();
    let registry = StaticProviderRegistry::new(
        providers
            .iter()
            .map(|(p, _)| p.clone() as Arc<dyn MarketDataProvider>)
            .collect(),
    );
    MarketDataOrchestrator::new(
        Arc::new(registry),
        PriorityConfig::from_descriptors(&descriptors),
        config,
    )
}

fn id(name: &'static str) -> ProviderId {
    Cow::Borrowed(name)
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Selection and fallback
// =============================================================================

#[tokio::test]
async fn test_higher_priority_provider_wins() {
    let primary = Arc::new(MockProvider::new("PRIMARY", dec!(100)));
    let secondary = Arc::new(MockProvider::new("SECONDARY", dec!(200)));
    let orchestrator = build(
        &[(secondary.clone(), 5), (primary.clone(), 10)],
        test_config(),
    );

    let resolution = orchestrator.resolve_quote("bitcoin").await;

    assert_eq!(resolution.source(), Some("PRIMARY"));
    assert_eq!(resolution.into_data().unwrap().price, dec!(100));
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn test_open_circuit_falls_back_and_caches() {
    let a = Arc::new(MockProvider::new("A", dec!(100)));
    let b = Arc::new(MockProvider::new("B", dec!(101)));
    let backend = Arc::new(RecordingBackend::default());
    let orchestrator = build(&[(a.clone(), 10), (b.clone(), 5)], test_config())
        .with_cache(MarketDataCache::new(backend.clone()));

    let error = MarketDataError::Timeout {
        provider: "A".to_string(),
    };
    for _ in 0..3 {
        orchestrator.circuit_breaker().record_failure(&id("A"), &error);
    }
    assert_eq!(orchestrator.circuit_breaker().state(&id("A")), CircuitState::Open);

    let first = orchestrator.resolve_quote("bitcoin").await;
    assert_eq!(first.source(), Some("B"));
    assert_eq!(backend.ttl_for("quote:bitcoin"), Some(Duration::from_secs(180)));

    let second = orchestrator.resolve_quote("bitcoin").await;
    assert_eq!(second.source(), Some("cache"));
    assert_eq!(second.into_data().unwrap().provider_source, "B");

    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_failure_falls_through_and_counts() {
    let a = Arc::new(MockProvider::new("A", dec!(100)).failing());
    let b = Arc::new(MockProvider::new("B", dec!(101)));
    let orchestrator = build(&[(a.clone(), 10), (b.clone(), 5)], test_config());

    let quote = orchestrator.get_quote("bitcoin").await.unwrap();

    assert_eq!(quote.provider_source, "B");
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("A")), 1);
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("B")), 0);
}

#[tokio::test]
async fn test_repeat_request_is_idempotent() {
    let provider = Arc::new(MockProvider::new("ONLY", dec!(42)));
    let orchestrator = build(&[(provider.clone(), 1)], test_config());

    let first = orchestrator.get_quote("ethereum").await;
    let second = orchestrator.get_quote("ethereum").await;

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_exhaustion_returns_none_with_diagnostics() {
    let a = Arc::new(MockProvider::new("A", dec!(1)).failing());
    let b = Arc::new(MockProvider::new("B", dec!(1)).failing());
    let orchestrator = build(&[(a.clone(), 2), (b.clone(), 1)], test_config());

    match orchestrator.resolve_quote("bitcoin").await {
        Resolution::Exhausted { diagnostics } => {
            let summary = diagnostics.summary();
            assert!(summary.contains("A: ERROR"));
            assert!(summary.contains("B: ERROR"));
        }
        Resolution::Success { source, .. } => panic!("unexpected success from {}", source),
    }
}

#[tokio::test]
async fn test_provider_timeout_is_a_failure() {
    let slow = Arc::new(
        MockProvider::new("SLOW", dec!(1))
            .with_delay(Duration::from_secs(5), Duration::from_millis(20)),
    );
    let fast = Arc::new(MockProvider::new("FAST", dec!(2)));
    let orchestrator = build(&[(slow.clone(), 10), (fast.clone(), 1)], test_config());

    let resolution = orchestrator.resolve_quote("bitcoin").await;

    assert_eq!(resolution.source(), Some("FAST"));
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("SLOW")), 1);
}

// =============================================================================
// Circuit breaker recovery
// =============================================================================

#[tokio::test]
async fn test_half_open_trial_closes_circuit() {
    let mut config = test_config();
    config.breaker.recovery_timeout = Duration::from_millis(300);
    let flaky = Arc::new(MockProvider::new("FLAKY", dec!(7)).failing());
    let orchestrator = build(&[(flaky.clone(), 1)], config);

    for _ in 0..3 {
        assert!(orchestrator.get_quote("bitcoin").await.is_none());
    }
    assert_eq!(orchestrator.circuit_breaker().state(&id("FLAKY")), CircuitState::Open);

    // Still open: not even called
    assert!(orchestrator.get_quote("bitcoin").await.is_none());
    assert_eq!(flaky.calls(), 3);

    tokio::time::sleep(Duration::from_millis(400)).await;
    flaky.set_failing(false);

    assert!(orchestrator.get_quote("bitcoin").await.is_some());
    assert_eq!(flaky.calls(), 4);
    assert_eq!(orchestrator.circuit_breaker().state(&id("FLAKY")), CircuitState::Closed);
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("FLAKY")), 0);
}

#[tokio::test]
async fn test_shared_sqlite_breaker_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");
    let breaker = |config: CircuitBreakerConfig| {
        let store = SqliteStateStore::<ProviderHealthState>::open(&path, "breaker").unwrap();
        CircuitBreaker::with_store(Arc::new(store), config)
    };

    let a = Arc::new(MockProvider::new("A", dec!(1)).failing());
    let b = Arc::new(MockProvider::new("B", dec!(2)));
    let first = build(&[(a.clone(), 10), (b.clone(), 1)], test_config())
        .with_circuit_breaker(breaker(test_config().breaker));
    let second = build(&[(a.clone(), 10), (b.clone(), 1)], test_config())
        .with_circuit_breaker(breaker(test_config().breaker));

    for symbol in ["s1", "s2", "s3"] {
        assert_eq!(first.resolve_quote(symbol).await.source(), Some("B"));
    }
    assert_eq!(a.calls(), 3);

    // The second instance sees the open circuit and never calls A
    assert_eq!(second.resolve_quote("s4").await.source(), Some("B"));
    assert_eq!(a.calls(), 3);
}

// =============================================================================
// Rate limiting and backoff
// =============================================================================

#[tokio::test]
async fn test_rate_limit_denial_skips_without_breaker_failure() {
    let budgeted = Arc::new(
        MockProvider::new("BUDGETED", dec!(1))
            .with_budget(RateBudget::new(1, Duration::from_secs(3600))),
    );
    let backup = Arc::new(MockProvider::new("BACKUP", dec!(2)));
    let orchestrator = build(&[(budgeted.clone(), 10), (backup.clone(), 1)], test_config());

    assert_eq!(orchestrator.resolve_quote("bitcoin").await.source(), Some("BUDGETED"));

    match orchestrator.resolve_quote("ethereum").await {
        Resolution::Success { source, .. } => assert_eq!(source, "BACKUP"),
        other => panic!("expected fallback, got {:?}", other),
    }

    assert_eq!(budgeted.calls(), 1);
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("BUDGETED")), 0);
    assert_eq!(
        orchestrator.circuit_breaker().state(&id("BUDGETED")),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_rate_limited_errors_are_retried() {
    let mut config = test_config();
    config.retry.max_retries = 2;
    let limited = Arc::new(MockProvider::new("LIMITED", dec!(1)).failing().rate_limited());
    let orchestrator = build(&[(limited.clone(), 1)], config);

    assert!(orchestrator.get_quote("bitcoin").await.is_none());

    assert_eq!(limited.calls(), 3);
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("LIMITED")), 1);
}

#[test]
fn test_backoff_delays_are_monotonic() {
    let policy = RetryPolicy::default();
    let delays: Vec<Duration> = (0..3).map(|attempt| policy.delay_for_attempt(attempt)).collect();

    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(delays.iter().all(|d| *d <= policy.max_delay));

    let capped = RetryPolicy {
        base_delay: Duration::from_secs(20),
        ..RetryPolicy::default()
    };
    let delays: Vec<Duration> = (0..3).map(|attempt| capped.delay_for_attempt(attempt)).collect();
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(delays[1], Duration::from_secs(30));
    assert_eq!(delays[2], Duration::from_secs(30));
}

// =============================================================================
// Batch
// =============================================================================

#[tokio::test]
async fn test_batch_partial_failure_individual_calls() {
    let provider = Arc::new(MockProvider::new("SINGLE", dec!(5)).failing_for(&["bad1", "bad2"]));
    let orchestrator = build(&[(provider.clone(), 1)], test_config());

    let quotes = orchestrator
        .get_batch_quotes(&symbols(&["btc", "bad1", "eth", "bad2", "sol"]))
        .await;

    assert_eq!(quotes.len(), 3);
    for symbol in ["btc", "eth", "sol"] {
        assert_eq!(quotes[symbol].symbol, symbol);
    }
    assert_eq!(provider.calls(), 5);
    assert_eq!(provider.batch_calls(), 0);
}

#[tokio::test]
async fn test_batch_provider_then_individual_fallback() {
    let batch = Arc::new(
        MockProvider::new("BATCH", dec!(5))
            .with_batch()
            .failing_for(&["doge"]),
    );
    let single = Arc::new(MockProvider::new("SINGLE", dec!(6)));
    let orchestrator = build(&[(batch.clone(), 10), (single.clone(), 1)], test_config());

    let quotes = orchestrator
        .get_batch_quotes(&symbols(&["btc", "eth", "doge"]))
        .await;

    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes["btc"].provider_source, "BATCH");
    assert_eq!(quotes["doge"].provider_source, "SINGLE");
    assert_eq!(batch.batch_calls(), 1);
    // Already tried in the batch pass, so no individual call
    assert_eq!(batch.calls(), 0);
    assert_eq!(single.calls(), 1);
}

#[tokio::test]
async fn test_batch_serves_cached_symbols_first() {
    let provider = Arc::new(MockProvider::new("ONLY", dec!(5)));
    let orchestrator = build(&[(provider.clone(), 1)], test_config());

    orchestrator.get_quote("btc").await.unwrap();
    assert_eq!(provider.calls(), 1);

    let quotes = orchestrator
        .get_batch_quotes(&symbols(&["btc", "eth", "btc"]))
        .await;

    assert_eq!(quotes.len(), 2);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_batch_failure_is_not_retried_on_same_provider() {
    let batch = Arc::new(
        MockProvider::new("BATCH", dec!(5))
            .with_batch()
            .failing_for(&["doge"]),
    );
    let orchestrator = build(&[(batch.clone(), 10)], test_config());

    let quotes = orchestrator.get_batch_quotes(&symbols(&["btc", "doge"])).await;

    assert_eq!(quotes.len(), 1);
    assert!(quotes.contains_key("btc"));
    assert_eq!(batch.calls(), 0);
    assert_eq!(batch.batch_calls(), 1);
}

#[tokio::test]
async fn test_empty_batch_falls_back_to_individual_calls_on_same_provider() {
    let batch = Arc::new(MockProvider::new("BATCH", dec!(5)).with_empty_batch());
    let single = Arc::new(MockProvider::new("SINGLE", dec!(6)));
    let orchestrator = build(&[(batch.clone(), 10), (single.clone(), 1)], test_config());

    let quotes = orchestrator
        .get_batch_quotes(&symbols(&["btc", "eth", "sol"]))
        .await;

    assert_eq!(quotes.len(), 3);
    for symbol in ["btc", "eth", "sol"] {
        assert_eq!(quotes[symbol].provider_source, "BATCH");
    }
    assert_eq!(batch.batch_calls(), 1);
    assert_eq!(batch.calls(), 3);
    assert_eq!(single.calls(), 0);
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("BATCH")), 0);
}

#[tokio::test]
async fn test_unregistered_provider_is_charged_once_per_batch() {
    let single = Arc::new(MockProvider::new("SINGLE", dec!(6)));
    let mut priorities = PriorityConfig::from_descriptors(&[ProviderDescriptor::for_provider(
        single.as_ref(),
        1,
    )]);
    priorities.push(Category::Quote, "GHOST", 10);

    let config = OrchestratorConfig {
        breaker: CircuitBreakerConfig {
            failure_threshold: 10,
            ..test_config().breaker
        },
        ..test_config()
    };
    let registry =
        StaticProviderRegistry::new(vec![single.clone() as Arc<dyn MarketDataProvider>]);
    let orchestrator = MarketDataOrchestrator::new(Arc::new(registry), priorities, config);

    let quotes = orchestrator
        .get_batch_quotes(&symbols(&["btc", "eth", "sol", "ada"]))
        .await;

    assert_eq!(quotes.len(), 4);
    assert_eq!(single.calls(), 4);
    assert_eq!(orchestrator.circuit_breaker().failure_count(&id("GHOST")), 1);
}

#[tokio::test]
async fn test_batch_pass_skips_providers_without_quotes() {
    let history_only = Arc::new(
        MockProvider::new("HISTORY_ONLY", dec!(5))
            .with_batch()
            .serving(&[Category::History]),
    );
    let single = Arc::new(MockProvider::new("SINGLE", dec!(6)));

    let registry = StaticProviderRegistry::new(vec![
        history_only.clone() as Arc<dyn MarketDataProvider>,
        single.clone() as Arc<dyn MarketDataProvider>,
    ]);
    let mut priorities = PriorityConfig::new();
    priorities.push(Category::Quote, "HISTORY_ONLY", 10);
    priorities.push(Category::Quote, "SINGLE", 1);
    let orchestrator = MarketDataOrchestrator::new(Arc::new(registry), priorities, test_config());

    let quotes = orchestrator.get_batch_quotes(&symbols(&["btc", "eth"])).await;

    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes["btc"].provider_source, "SINGLE");
    assert_eq!(history_only.batch_calls(), 0);
    assert_eq!(history_only.calls(), 0);
}

// =============================================================================
// History
// =============================================================================

#[tokio::test]
async fn test_history_with_and_without_cache() {
    let provider = Arc::new(MockProvider::new("HIST", dec!(10)));
    let orchestrator = build(&[(provider.clone(), 1)], test_config());

    let first = orchestrator
        .get_history("bitcoin", HistoryWindow::days(7), true)
        .await
        .unwrap();
    assert_eq!(first.provider_source, "HIST");
    assert_eq!(first.series.len(), 7);

    let cached = orchestrator
        .get_history("bitcoin", HistoryWindow::days(7), true)
        .await
        .unwrap();
    assert_eq!(cached.provider_source, "cache");
    assert_eq!(cached.series, first.series);
    assert_eq!(provider.calls(), 1);

    // A different window is a different cache entry
    orchestrator
        .get_history("bitcoin", HistoryWindow::days(30), true)
        .await
        .unwrap();
    assert_eq!(provider.calls(), 2);

    let fresh = orchestrator
        .get_history("bitcoin", HistoryWindow::days(7), false)
        .await
        .unwrap();
    assert_eq!(fresh.provider_source, "HIST");
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_history_cache_uses_history_ttl() {
    let provider = Arc::new(MockProvider::new("HIST", dec!(10)));
    let backend = Arc::new(RecordingBackend::default());
    let orchestrator = build(&[(provider.clone(), 1)], test_config())
        .with_cache(MarketDataCache::new(backend.clone()));

    orchestrator
        .get_history("bitcoin", HistoryWindow::days(30), true)
        .await
        .unwrap();

    assert_eq!(
        backend.ttl_for("history:bitcoin:days=30"),
        Some(Duration::from_secs(600))
    );
}
