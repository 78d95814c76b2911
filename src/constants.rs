//! Constants for the market snapshot client
//!
//! Defaults for every `ClientConfig` field live here. Runtime overrides come
//! from `ClientConfig::from_env`.

/// Upstream API base URL
pub const DEFAULT_BASE_URL: &str = "https://openapiv1.coinstats.app";

/// Endpoint returning the enumerable coin list
pub const COINS_ENDPOINT: &str = "/coins";

/// Quote currency requested from the upstream
pub const DEFAULT_CURRENCY: &str = "USD";

/// HTTP request timeout when fetching coins (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Initial minimum spacing between two upstream requests (in milliseconds)
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;

/// Factor applied to the pacing window every time the upstream answers 429
pub const BACKOFF_MULTIPLIER: u32 = 2;

/// Emit an info-level milestone every this many requests
pub const REQUEST_COUNT_LOG_EVERY: u64 = 10;

/// Header carrying the API key (lowercase, as HTTP/2 sends it)
pub const API_KEY_HEADER: &str = "x-api-key";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "market-snapshot-sdk/0.1.0";

/// Environment variable names read by `ClientConfig::from_env`
pub mod env {
    pub const API_KEY: &str = "MARKET_API_KEY";
    pub const BASE_URL: &str = "MARKET_API_BASE_URL";
    pub const CURRENCY: &str = "MARKET_API_CURRENCY";
    pub const MIN_INTERVAL_MS: &str = "MARKET_MIN_INTERVAL_MS";
    pub const REQUEST_TIMEOUT_SECS: &str = "MARKET_REQUEST_TIMEOUT_SECS";
}
