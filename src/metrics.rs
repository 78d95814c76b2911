//! Fetch metrics collection and reporting
//!
//! Tracks latency percentiles of successful requests and counts per outcome
//! class for a single client.

use crate::error::FailureKind;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for latency calculation
const MAX_SAMPLES: usize = 100;

/// Metrics for a single client
#[derive(Debug, Clone, PartialEq)]
pub struct FetcherMetrics {
    /// 50th percentile latency of successful requests in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful requests in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of requests recorded
    pub total_requests: u64,
    /// Requests rejected with 429
    pub rate_limited: u64,
    /// Requests answered with another non-2xx status
    pub http_errors: u64,
    /// Requests that failed in transport (network, timeout, bad body)
    pub transport_errors: u64,
    /// Whether the most recent request succeeded
    pub last_success: Option<bool>,
}

impl FetcherMetrics {
    /// Creates metrics with no data
    pub fn empty() -> Self {
        Self {
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            rate_limited: 0,
            http_errors: 0,
            transport_errors: 0,
            last_success: None,
        }
    }

    /// Number of failed requests across all classes
    pub fn failed_requests(&self) -> u64 {
        self.rate_limited + self.http_errors + self.transport_errors
    }

    /// Number of successful requests
    pub fn successful_requests(&self) -> u64 {
        self.total_requests - self.failed_requests()
    }
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    rate_limited: u64,
    http_errors: u64,
    transport_errors: u64,
    last_success: Option<bool>,
}

/// Collects and computes metrics for a client
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Rolling window of successful request latencies (ms)
    samples: RwLock<VecDeque<f64>>,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Records a request with its duration and failure class (`None` on success)
    pub async fn record(&self, duration: Duration, failure: Option<FailureKind>) {
        {
            let mut counters = self.counters.write().await;
            counters.total += 1;
            counters.last_success = Some(failure.is_none());
            match failure {
                None => {}
                Some(FailureKind::RateLimited) => counters.rate_limited += 1,
                Some(FailureKind::UpstreamHttp) => counters.http_errors += 1,
                Some(FailureKind::Transport) => counters.transport_errors += 1,
            }
        }

        if failure.is_none() {
            let mut samples = self.samples.write().await;
            if samples.len() >= MAX_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(duration.as_micros() as f64 / 1000.0);
        }
    }

    /// Computes current metrics from collected samples
    pub async fn snapshot(&self) -> FetcherMetrics {
        let counters = self.counters.read().await;
        if counters.total == 0 {
            return FetcherMetrics::empty();
        }

        let mut latencies: Vec<f64> = self.samples.read().await.iter().copied().collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let failed = counters.rate_limited + counters.http_errors + counters.transport_errors;

        FetcherMetrics {
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate: (counters.total - failed) as f64 / counters.total as f64,
            total_requests: counters.total,
            rate_limited: counters.rate_limited,
            http_errors: counters.http_errors,
            transport_errors: counters.transport_errors,
            last_success: counters.last_success,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new();

        collector.record(Duration::from_millis(100), None).await;
        collector.record(Duration::from_millis(200), None).await;
        collector
            .record(Duration::from_millis(150), Some(FailureKind::RateLimited))
            .await;
        collector
            .record(Duration::from_millis(10), Some(FailureKind::Transport))
            .await;

        let metrics = collector.snapshot().await;

        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.rate_limited, 1);
        assert_eq!(metrics.transport_errors, 1);
        assert_eq!(metrics.http_errors, 0);
        assert_eq!(metrics.failed_requests(), 2);
        assert_eq!(metrics.successful_requests(), 2);
        assert_eq!(metrics.last_success, Some(false));
        assert!((metrics.success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.latency_p99_ms, 200.0);
    }

    #[tokio::test]
    async fn test_empty_metrics() {
        let metrics = MetricsCollector::new().snapshot().await;
        assert_eq!(metrics, FetcherMetrics::empty());
    }

    #[test]
    fn test_percentile() {
        let values: Vec<f64> = (1..=11).map(f64::from).collect();
        assert_eq!(percentile(&values, 50.0), 6.0);
        assert_eq!(percentile(&values, 99.0), 11.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
