//! Types for the market snapshot client

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::Instant;

/// A single coin as returned by the upstream
///
/// `id`, `symbol` and `price` are lifted out of the upstream record; every
/// other field is kept untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    /// Upstream identifier (e.g. "bitcoin")
    #[serde(default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ticker symbol (e.g. "BTC")
    #[serde(default, deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Price in the requested currency
    #[serde(default, deserialize_with = "lenient_f64")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Remaining upstream fields (name, marketCap, rank, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CoinSnapshot {
    /// Create a snapshot with a symbol and a price
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            id: None,
            symbol: Some(symbol.into()),
            price: Some(price),
            extra: Map::new(),
        }
    }

    /// Best display label: symbol, then id
    pub fn label(&self) -> &str {
        self.symbol
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("?")
    }

    /// Look up a passthrough field by its upstream name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Accepts a JSON string or number
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a JSON number or a numeric string
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Tagged result of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Upstream answered 2xx; coins are the normalized sequence (possibly empty)
    Success(Vec<CoinSnapshot>),
    /// Any failure, absorbed at the client boundary
    Failed(FetchError),
}

impl FetchOutcome {
    /// Returns true for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Returns the error if the fetch failed
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Success(_) => None,
            FetchOutcome::Failed(err) => Some(err),
        }
    }
}

/// Flattened fetch result handed to renderers
///
/// A failure is `{coins: [], error: "..."}`; a success has no `error` field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchResult {
    pub coins: Vec<CoinSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchResult {
    /// Returns true when no error is attached
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<FetchOutcome> for FetchResult {
    fn from(outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Success(coins) => Self { coins, error: None },
            FetchOutcome::Failed(err) => Self {
                coins: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }
}

/// Point-in-time view of a client's pacing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    /// Requests dispatched so far (successful or not)
    pub request_count: u64,
    /// Current minimum spacing between requests
    pub min_interval: Duration,
    /// When the most recent request was dispatched
    pub last_request_at: Option<Instant>,
}

/// Overall component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Last request succeeded and no backoff is active
    Healthy,
    /// Still serving, but backing off or the last request failed
    Degraded,
    /// Nothing has succeeded yet and at least one request failed
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
