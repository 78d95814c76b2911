//! Client configuration

use crate::constants::{
    env, DEFAULT_BASE_URL, DEFAULT_CURRENCY, DEFAULT_MIN_INTERVAL_MS, REQUEST_TIMEOUT_SECS,
    USER_AGENT,
};
use crate::error::ConfigError;
use std::time::Duration;

/// Configuration for a `RateLimitedFetcher`
#[derive(Clone)]
pub struct ClientConfig {
    /// Upstream base URL (no trailing slash needed)
    pub base_url: String,

    /// API key sent in the `API_KEY_HEADER` header
    pub api_key: String,

    /// Quote currency passed as `currency`
    pub currency: String,

    /// Upper bound for a single request
    pub request_timeout: Duration,

    /// Initial minimum spacing between requests
    pub min_interval: Duration,

    /// User agent for HTTP requests
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration with default settings and the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Create a test configuration pointing at a mock server
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            request_timeout: Duration::from_secs(2),
            min_interval: Duration::ZERO,
            ..Self::new("test-key")
        }
    }

    /// Create configuration from environment variables
    ///
    /// Unset variables fall back to the defaults in `constants`. A missing
    /// API key is allowed; the upstream will reject the request.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(lookup(env::API_KEY).unwrap_or_default());

        if let Some(url) = lookup(env::BASE_URL) {
            config.base_url = url;
        }
        if let Some(currency) = lookup(env::CURRENCY) {
            config.currency = currency;
        }
        if let Some(raw) = lookup(env::MIN_INTERVAL_MS) {
            let ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::invalid_env(env::MIN_INTERVAL_MS, raw.clone()))?;
            config.min_interval = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(env::REQUEST_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::invalid_env(env::REQUEST_TIMEOUT_SECS, raw.clone()))?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Full URL of the coins endpoint
    pub fn coins_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            crate::constants::COINS_ENDPOINT
        )
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.has_api_key())
            .field("currency", &self.currency)
            .field("request_timeout", &self.request_timeout)
            .field("min_interval", &self.min_interval)
            .finish()
    }
}
