//! Transport abstraction for issuing upstream HTTP requests

use crate::error::FetchError;
use async_trait::async_trait;

/// A GET request against the upstream coins endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    /// Absolute URL without query string
    pub url: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
}

impl UpstreamRequest {
    /// Looks up a query parameter by name
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw upstream response: status and undecoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for upstream transports
///
/// Implementations only move bytes: status interpretation, timeouts and
/// shape normalization belong to the fetcher. A non-2xx status is a normal
/// `Ok` response here.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a GET request and returns the raw response
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError>;

    /// Returns the name of this transport
    fn transport_name(&self) -> &'static str;
}
