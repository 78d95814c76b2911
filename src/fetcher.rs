//! Rate-limited fetcher for the upstream coins endpoint
//!
//! Every call goes through the same pipeline:
//!
//! ```text
//! pacing gate (wait out min_interval)
//!     ↓
//! bookkeeping (last_request_at, request_count)
//!     ↓
//! bounded GET (request_timeout)
//!     ↓
//! status interpretation (429 doubles min_interval)
//!     ↓
//! shape normalization
//! ```
//!
//! Failures never escape: they come back as `FetchOutcome::Failed` or as a
//! `FetchResult` with an `error` description.

use crate::{
    clock::{Clock, TokioClock},
    config::ClientConfig,
    constants::{BACKOFF_MULTIPLIER, REQUEST_COUNT_LOG_EVERY},
    error::{ConfigError, FetchError},
    metrics::{FetcherMetrics, MetricsCollector},
    shape::normalize_coins,
    transport::{Transport, UpstreamRequest, UpstreamResponse},
    transports::HttpTransport,
    types::{ClientStats, CoinSnapshot, ComponentHealth, FetchOutcome, FetchResult, HealthStatus},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Client for the upstream coins endpoint with request pacing and backoff
///
/// Dispatches from one instance are spaced at least `min_interval` apart,
/// concurrent callers included: the pacing check and the bookkeeping run
/// under a per-instance async mutex. The window is re-read after every
/// pacing sleep, so a 429 arriving mid-wait stretches the wait. The request
/// itself is not held under that mutex.
///
/// # Example
/// ```no_run
/// use market_snapshot_sdk::{ClientConfig, RateLimitedFetcher};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = RateLimitedFetcher::new(ClientConfig::from_env()?)?;
/// let result = fetcher.fetch_coins(20).await;
/// match result.error {
///     None => println!("{} coins", result.coins.len()),
///     Some(e) => println!("no data: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
pub struct RateLimitedFetcher {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    /// Serializes pacing and bookkeeping across callers
    pacing_gate: Mutex<()>,
    /// Dispatch instant of the most recent request; written under the gate
    last_request_at: StdMutex<Option<Instant>>,
    request_count: AtomicU64,
    min_interval_ms: AtomicU64,
    initial_interval_ms: u64,
    metrics: MetricsCollector,
}

impl RateLimitedFetcher {
    /// Creates a fetcher using the reqwest transport and the tokio clock
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(TokioClock),
        ))
    }

    /// Creates a fetcher with a custom transport and clock
    ///
    /// This is primarily for testing with mock transports.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let initial_interval_ms = duration_to_ms(config.min_interval);

        Self {
            config,
            transport,
            clock,
            pacing_gate: Mutex::new(()),
            last_request_at: StdMutex::new(None),
            request_count: AtomicU64::new(0),
            min_interval_ms: AtomicU64::new(initial_interval_ms),
            initial_interval_ms,
            metrics: MetricsCollector::new(),
        }
    }

    /// Fetches up to `limit` coins, flattened for rendering
    ///
    /// Always returns a renderable value: on failure `coins` is empty and
    /// `error` describes what went wrong.
    pub async fn fetch_coins(&self, limit: u32) -> FetchResult {
        self.fetch_outcome(limit).await.into()
    }

    /// Fetches up to `limit` coins, returning the tagged outcome
    pub async fn fetch_outcome(&self, limit: u32) -> FetchOutcome {
        let request_count = self.acquire_slot().await;
        let request = self.build_request(limit);

        tracing::debug!(
            limit,
            request_count,
            transport = self.transport.transport_name(),
            "Dispatching coins request"
        );

        let started = self.clock.now();
        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.transport.get(&request),
        )
        .await
        {
            Ok(response) => response.and_then(|response| self.interpret(response)),
            Err(_) => Err(FetchError::Timeout {
                after: self.config.request_timeout,
            }),
        };
        let latency = self.clock.now().saturating_duration_since(started);

        match result {
            Ok(coins) => {
                tracing::debug!(
                    count = coins.len(),
                    latency_ms = latency.as_millis() as u64,
                    "Fetched coins"
                );
                self.metrics.record(latency, None).await;
                FetchOutcome::Success(coins)
            }
            Err(err) => {
                tracing::warn!(error = %err, request_count, "Coins request failed");
                self.metrics.record(latency, Some(err.kind())).await;
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Waits out the pacing window, then records the dispatch
    ///
    /// Returns the request number of the slot just taken.
    async fn acquire_slot(&self) -> u64 {
        let _gate = self.pacing_gate.lock().await;

        if let Some(previous) = self.last_request_at() {
            // min_interval may grow while we sleep
            loop {
                let elapsed = self.clock.now().saturating_duration_since(previous);
                let interval = self.min_interval();
                if elapsed >= interval {
                    break;
                }
                let wait = interval - elapsed;
                tracing::trace!(wait_ms = wait.as_millis() as u64, "Pacing request");
                self.clock.sleep(wait).await;
            }
        }

        let now = self.clock.now();
        *self
            .last_request_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;

        if count % REQUEST_COUNT_LOG_EVERY == 0 {
            tracing::info!(
                request_count = count,
                min_interval_ms = self.min_interval_ms.load(Ordering::SeqCst),
                "Upstream request milestone"
            );
        }

        count
    }

    fn build_request(&self, limit: u32) -> UpstreamRequest {
        UpstreamRequest {
            url: self.config.coins_url(),
            query: vec![
                ("limit".to_string(), limit.to_string()),
                ("currency".to_string(), self.config.currency.clone()),
            ],
        }
    }

    /// Maps a raw response to coins or an error
    fn interpret(&self, response: UpstreamResponse) -> Result<Vec<CoinSnapshot>, FetchError> {
        if response.status == 429 {
            self.back_off();
            return Err(FetchError::RateLimited);
        }

        if !response.is_success() {
            return Err(FetchError::Http {
                status: response.status,
            });
        }

        let body: serde_json::Value = serde_json::from_str(&response.body)
            .map_err(|e| FetchError::invalid_body(e.to_string()))?;

        Ok(normalize_coins(&body))
    }

    /// Raises the pacing window after an overload signal
    fn back_off(&self) {
        let previous = self
            .min_interval_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |ms| {
                Some(ms.saturating_mul(u64::from(BACKOFF_MULTIPLIER)).max(ms.saturating_add(1)))
            })
            .unwrap_or_else(|ms| ms);

        tracing::warn!(
            previous_ms = previous,
            min_interval_ms = self.min_interval_ms.load(Ordering::SeqCst),
            "Upstream rate limit hit, increasing request interval"
        );
    }

    /// Current minimum spacing between requests
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms.load(Ordering::SeqCst))
    }

    /// Requests dispatched so far
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// When the most recent request was dispatched
    pub fn last_request_at(&self) -> Option<Instant> {
        *self
            .last_request_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the pacing state
    ///
    /// Does not wait for callers parked in the pacing gate.
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            request_count: self.request_count(),
            min_interval: self.min_interval(),
            last_request_at: self.last_request_at(),
        }
    }

    /// Latency percentiles and outcome counts
    pub async fn metrics(&self) -> FetcherMetrics {
        self.metrics.snapshot().await
    }

    /// Returns the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform a health check on the fetcher
    pub async fn health_check(&self) -> ComponentHealth {
        let metrics = self.metrics().await;
        let min_interval_ms = self.min_interval_ms.load(Ordering::SeqCst);
        let backing_off = min_interval_ms > self.initial_interval_ms;

        let mut details = HashMap::new();
        details.insert(
            "request_count".to_string(),
            serde_json::json!(self.request_count()),
        );
        details.insert(
            "min_interval_ms".to_string(),
            serde_json::json!(min_interval_ms),
        );
        details.insert(
            "rate_limited".to_string(),
            serde_json::json!(metrics.rate_limited),
        );
        details.insert(
            "success_rate".to_string(),
            serde_json::json!(metrics.success_rate),
        );
        details.insert(
            "transport".to_string(),
            serde_json::json!(self.transport.transport_name()),
        );

        let status = if metrics.total_requests > 0 && metrics.successful_requests() == 0 {
            HealthStatus::Unhealthy
        } else if backing_off || metrics.last_success == Some(false) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy if metrics.total_requests == 0 => {
                "No upstream requests issued yet".to_string()
            }
            HealthStatus::Healthy => "Upstream is serving data".to_string(),
            HealthStatus::Degraded if backing_off => format!(
                "Backing off after rate limiting (interval {}ms)",
                min_interval_ms
            ),
            HealthStatus::Degraded => "Last upstream request failed".to_string(),
            HealthStatus::Unhealthy => "No upstream request has succeeded".to_string(),
        };

        ComponentHealth {
            name: "market_snapshot_fetcher".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }
}

impl std::fmt::Debug for RateLimitedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedFetcher")
            .field("config", &self.config)
            .field("transport", &self.transport.transport_name())
            .field("request_count", &self.request_count())
            .field("min_interval", &self.min_interval())
            .finish()
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mock::ManualClock;
    use crate::transport::mock::{MockReply, MockTransport};
    use serde_json::json;

    fn config(min_interval_ms: u64) -> ClientConfig {
        ClientConfig {
            min_interval: Duration::from_millis(min_interval_ms),
            ..ClientConfig::for_testing("http://upstream.test")
        }
    }

    fn manual_fetcher(min_interval_ms: u64) -> (RateLimitedFetcher, MockTransport, ManualClock) {
        let clock = ManualClock::new();
        let transport = MockTransport::new().with_clock(Arc::new(clock.clone()));
        let fetcher = RateLimitedFetcher::with_parts(
            config(min_interval_ms),
            Arc::new(transport.clone()),
            Arc::new(clock.clone()),
        );
        (fetcher, transport, clock)
    }

    #[tokio::test]
    async fn test_request_shape() {
        let (fetcher, transport, _clock) = manual_fetcher(0);
        fetcher.fetch_coins(25).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://upstream.test/coins");
        assert_eq!(requests[0].query_param("limit"), Some("25"));
        assert_eq!(requests[0].query_param("currency"), Some("USD"));
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let (fetcher, transport, clock) = manual_fetcher(1000);
        let t0 = clock.now();

        transport.push_json(200, json!({"result": [{"symbol": "BTC", "price": 50000}]}));
        let first = fetcher.fetch_coins(10).await;
        assert_eq!(first.error, None);
        assert_eq!(first.coins, vec![CoinSnapshot::new("BTC", 50000.0)]);

        clock.advance(Duration::from_millis(200));
        transport.push_json(200, json!([]));
        let second = fetcher.fetch_coins(10).await;
        assert!(second.is_ok());
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(800)]);

        transport.push_status(429);
        let third = fetcher.fetch_coins(10).await;
        assert_eq!(third.coins, Vec::new());
        assert_eq!(third.error.as_deref(), Some("Rate limit exceeded"));
        assert_eq!(fetcher.min_interval(), Duration::from_millis(2000));

        let dispatched: Vec<Duration> = transport
            .dispatch_times()
            .into_iter()
            .map(|at| at - t0)
            .collect();
        assert_eq!(
            dispatched,
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(2000),
            ]
        );

        // The raised window applies to the next call
        fetcher.fetch_coins(10).await;
        assert_eq!(
            transport.dispatch_times()[3] - transport.dispatch_times()[2],
            Duration::from_millis(2000)
        );
    }

    #[tokio::test]
    async fn test_no_wait_when_window_already_elapsed() {
        let (fetcher, _transport, clock) = manual_fetcher(500);
        fetcher.fetch_coins(1).await;
        clock.advance(Duration::from_millis(700));
        fetcher.fetch_coins(1).await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_backoff_is_monotonic() {
        let (fetcher, transport, _clock) = manual_fetcher(100);

        transport.push_status(429);
        fetcher.fetch_coins(5).await;
        assert_eq!(fetcher.min_interval(), Duration::from_millis(200));

        transport.push_json(200, json!([]));
        transport.push_status(500);
        transport.push(MockReply::Fail(FetchError::transport("reset")));
        for _ in 0..3 {
            fetcher.fetch_coins(5).await;
            assert_eq!(fetcher.min_interval(), Duration::from_millis(200));
        }

        transport.push_status(429);
        fetcher.fetch_coins(5).await;
        assert_eq!(fetcher.min_interval(), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_backoff_from_zero_interval_still_increases() {
        let (fetcher, transport, _clock) = manual_fetcher(0);
        transport.push_status(429);
        fetcher.fetch_coins(5).await;
        assert!(fetcher.min_interval() > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_http_error_carries_status() {
        let (fetcher, transport, _clock) = manual_fetcher(0);
        transport.push_status(503);

        let outcome = fetcher.fetch_outcome(5).await;
        assert_eq!(outcome, FetchOutcome::Failed(FetchError::Http { status: 503 }));

        transport.push_status(500);
        let result = fetcher.fetch_coins(5).await;
        assert!(result.coins.is_empty());
        assert!(result.error.unwrap().contains("500"));
        assert_eq!(fetcher.min_interval(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_result_totality() {
        let (fetcher, transport, _clock) = manual_fetcher(0);
        transport.push_json(200, json!({"coins": [{"symbol": "ETH", "price": 3000}]}));
        transport.push_status(429);
        transport.push_status(500);
        transport.push(MockReply::Fail(FetchError::transport("connection refused")));
        transport.push(MockReply::Respond(UpstreamResponse::new(200, "{not json")));
        transport.push(MockReply::Respond(UpstreamResponse::new(200, "")));
        transport.push_json(200, json!({"unexpected": true}));

        let results = [
            fetcher.fetch_coins(1).await,
            fetcher.fetch_coins(1).await,
            fetcher.fetch_coins(1).await,
            fetcher.fetch_coins(1).await,
            fetcher.fetch_coins(1).await,
            fetcher.fetch_coins(1).await,
            fetcher.fetch_coins(1).await,
        ];

        assert_eq!(results[0].coins.len(), 1);
        assert!(results[0].is_ok());
        for failed in &results[1..6] {
            assert!(failed.coins.is_empty());
            assert!(failed.error.is_some());
        }
        assert!(results[3].error.as_deref().unwrap().contains("connection refused"));
        assert!(results[4]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Invalid response body"));
        assert_eq!(results[6], FetchResult::default());
    }

    #[tokio::test]
    async fn test_request_count_includes_failures() {
        let (fetcher, transport, _clock) = manual_fetcher(0);
        transport.push_status(500);
        transport.push(MockReply::Fail(FetchError::transport("dns")));
        transport.push_status(429);

        for _ in 0..3 {
            fetcher.fetch_coins(1).await;
        }

        let stats = fetcher.stats();
        assert_eq!(stats.request_count, 3);
        assert!(stats.last_request_at.is_some());
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failure_and_counted() {
        let transport = MockTransport::new();
        transport.push(MockReply::Hang);
        let fetcher = RateLimitedFetcher::with_parts(
            config(0),
            Arc::new(transport.clone()),
            Arc::new(TokioClock),
        );

        let started = Instant::now();
        let outcome = fetcher.fetch_outcome(10).await;

        assert_eq!(
            outcome,
            FetchOutcome::Failed(FetchError::Timeout {
                after: Duration::from_secs(2)
            })
        );
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(fetcher.request_count(), 1);
        assert_eq!(fetcher.metrics().await.transport_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_within_bound_succeeds() {
        let transport = MockTransport::new();
        transport.push(MockReply::Delayed(
            Duration::from_millis(1500),
            UpstreamResponse::new(200, r#"[{"symbol":"BTC","price":1}]"#),
        ));
        let fetcher = RateLimitedFetcher::with_parts(
            config(0),
            Arc::new(transport),
            Arc::new(TokioClock),
        );

        let result = fetcher.fetch_coins(1).await;
        assert!(result.is_ok());
        assert_eq!(result.coins.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_respect_pacing() {
        let transport = MockTransport::new();
        let fetcher = Arc::new(RateLimitedFetcher::with_parts(
            config(1000),
            Arc::new(transport.clone()),
            Arc::new(TokioClock),
        ));

        let calls = (0..4).map(|_| {
            let fetcher = fetcher.clone();
            async move { fetcher.fetch_coins(5).await }
        });
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(FetchResult::is_ok));

        let mut times = transport.dispatch_times();
        times.sort();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
        assert_eq!(fetcher.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_during_pacing_wait_stretches_the_wait() {
        let transport = MockTransport::new();
        transport.push(MockReply::Delayed(
            Duration::from_millis(500),
            UpstreamResponse::new(429, ""),
        ));
        let fetcher = RateLimitedFetcher::with_parts(
            config(1000),
            Arc::new(transport.clone()),
            Arc::new(TokioClock),
        );

        let (first, second) = tokio::join!(fetcher.fetch_coins(5), fetcher.fetch_coins(5));

        assert_eq!(first.error.as_deref(), Some("Rate limit exceeded"));
        assert!(second.is_ok());
        assert_eq!(fetcher.min_interval(), Duration::from_millis(2000));

        let times = transport.dispatch_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_do_not_wait_for_the_pacing_gate() {
        let transport = MockTransport::new();
        let fetcher = Arc::new(RateLimitedFetcher::with_parts(
            config(60_000),
            Arc::new(transport.clone()),
            Arc::new(TokioClock),
        ));

        fetcher.fetch_coins(1).await;
        let first_dispatch = fetcher.last_request_at();

        let waiting = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch_coins(1).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stats = fetcher.stats();
        assert_eq!(stats.request_count, 1);
        assert_eq!(stats.last_request_at, first_dispatch);
        assert_eq!(transport.call_count(), 1);

        assert!(waiting.await.unwrap().is_ok());
        assert_eq!(fetcher.stats().request_count, 2);
    }

    #[tokio::test]
    async fn test_health_check_transitions() {
        let (fetcher, transport, _clock) = manual_fetcher(100);
        assert_eq!(fetcher.health_check().await.status, HealthStatus::Healthy);

        transport.push_status(500);
        fetcher.fetch_coins(1).await;
        assert_eq!(fetcher.health_check().await.status, HealthStatus::Unhealthy);

        transport.push_json(200, json!([]));
        fetcher.fetch_coins(1).await;
        assert_eq!(fetcher.health_check().await.status, HealthStatus::Healthy);

        transport.push_status(429);
        fetcher.fetch_coins(1).await;
        transport.push_json(200, json!([]));
        fetcher.fetch_coins(1).await;
        let health = fetcher.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.details["min_interval_ms"], json!(200));
    }

    #[tokio::test]
    async fn test_debug_hides_api_key() {
        let (fetcher, _transport, _clock) = manual_fetcher(0);
        let debug = format!("{fetcher:?}");
        assert!(!debug.contains("test-key"));
    }
}
