//! Error types for the market snapshot client

use std::time::Duration;
use thiserror::Error;

/// Failure class of a fetch, used for metrics and health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Upstream answered 429
    RateLimited,
    /// Upstream answered any other non-2xx status
    UpstreamHttp,
    /// Network failure, timeout or an unreadable body
    Transport,
}

/// Errors that can occur while fetching a snapshot from the upstream
///
/// These never escape `RateLimitedFetcher::fetch_coins`; they are flattened
/// into `FetchResult::error` through their `Display` output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// Upstream signalled overload (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Upstream answered with a non-success status other than 429
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// The request did not complete within the configured bound
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// Network request failed
    #[error("Network error: {0}")]
    Transport(String),

    /// Successful status but the body is not valid JSON
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

impl FetchError {
    /// Creates a Transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an InvalidBody error
    pub fn invalid_body(msg: impl Into<String>) -> Self {
        Self::InvalidBody(msg.into())
    }

    /// Returns the failure class of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::RateLimited => FailureKind::RateLimited,
            FetchError::Http { .. } => FailureKind::UpstreamHttp,
            FetchError::Timeout { .. }
            | FetchError::Transport(_)
            | FetchError::InvalidBody(_) => FailureKind::Transport,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Errors that can occur while building a client
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    /// A header value (API key, user agent) is not valid HTTP
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// The underlying HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ConfigError {
    /// Creates an InvalidEnv error
    pub fn invalid_env(var: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            var,
            value: value.into(),
        }
    }
}
