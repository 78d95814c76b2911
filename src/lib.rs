//! # Market Snapshot SDK
//!
//! Fetches an enumerable coin market snapshot from a single upstream REST
//! provider, with request pacing, a bounded request timeout, backoff on
//! HTTP 429 and normalization of the upstream's inconsistent response shapes.
//!
//! ## Usage
//!
//! ```no_run
//! use market_snapshot_sdk::{ClientConfig, RateLimitedFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = RateLimitedFetcher::new(ClientConfig::new("YOUR_API_KEY"))?;
//!
//! // Never fails: errors come back as data
//! let result = fetcher.fetch_coins(50).await;
//! if let Some(error) = &result.error {
//!     println!("No data: {}", error);
//! }
//! for coin in &result.coins {
//!     println!("{}: ${:.2}", coin.label(), coin.price.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pacing and backoff
//!
//! Requests from one fetcher are dispatched at least `min_interval` apart
//! (1 second by default). Every 429 from the upstream doubles that window for
//! the rest of the fetcher's life; nothing lowers it again.
//!
//! ## Error Handling
//!
//! `fetch_coins` flattens failures into `FetchResult::error`. Callers that
//! want to branch on the failure class use `fetch_outcome`:
//!
//! ```no_run
//! use market_snapshot_sdk::{FetchError, FetchOutcome, RateLimitedFetcher};
//!
//! # async fn example(fetcher: RateLimitedFetcher) {
//! match fetcher.fetch_outcome(10).await {
//!     FetchOutcome::Success(coins) => println!("{} coins", coins.len()),
//!     FetchOutcome::Failed(FetchError::RateLimited) => println!("slowing down"),
//!     FetchOutcome::Failed(FetchError::Http { status }) => println!("upstream said {}", status),
//!     FetchOutcome::Failed(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod shape;
pub mod transport;
pub mod transports;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, TokioClock};
pub use config::ClientConfig;
pub use error::{ConfigError, FailureKind, FetchError};
pub use fetcher::RateLimitedFetcher;
pub use metrics::FetcherMetrics;
pub use shape::{CoinLocator, COIN_LOCATORS};
pub use transport::{Transport, UpstreamRequest, UpstreamResponse};
pub use transports::HttpTransport;
pub use types::{
    ClientStats, CoinSnapshot, ComponentHealth, FetchOutcome, FetchResult, HealthStatus,
};
