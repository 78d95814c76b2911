//! Time source abstraction used for request pacing

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Source of monotonic time and suspension for the pacing gate
///
/// The default `TokioClock` delegates to `tokio::time`, so it also follows
/// tokio's paused test clock.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
