//! reqwest-backed upstream transport

use crate::{
    config::ClientConfig,
    constants::API_KEY_HEADER,
    error::{ConfigError, FetchError},
    transport::{Transport, UpstreamRequest, UpstreamResponse},
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;

/// HTTP transport using a pooled reqwest client
///
/// The API key and `Accept: application/json` are installed as default
/// headers, so every request carries them.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: std::time::Duration,
}

impl HttpTransport {
    /// Creates a new HTTP transport from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| ConfigError::InvalidHeader(API_KEY_HEADER))?;
        api_key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            timeout: config.request_timeout,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        Ok(UpstreamResponse { status, body })
    }

    fn transport_name(&self) -> &'static str {
        "reqwest"
    }
}

impl HttpTransport {
    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                after: self.timeout,
            }
        } else {
            FetchError::from(err)
        }
    }
}
