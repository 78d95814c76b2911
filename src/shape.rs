//! Shape normalization for upstream coin payloads
//!
//! The upstream has shipped the coin list under different top-level keys over
//! time, and some deployments return the bare array. `COIN_LOCATORS` lists
//! the known locations in priority order; the first one holding an array wins.

use crate::types::CoinSnapshot;
use serde_json::Value;

/// A place in the response body where the coin sequence may live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinLocator {
    /// Array under a top-level object key
    Key(&'static str),
    /// The body itself is the array
    Root,
}

impl CoinLocator {
    /// Returns the array at this location, if there is one
    pub fn locate<'a>(&self, body: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            CoinLocator::Key(key) => body.get(*key).and_then(Value::as_array),
            CoinLocator::Root => body.as_array(),
        }
    }
}

/// Known coin-sequence locations, highest priority first
pub const COIN_LOCATORS: &[CoinLocator] = &[
    CoinLocator::Key("result"),
    CoinLocator::Key("coins"),
    CoinLocator::Key("data"),
    CoinLocator::Root,
];

/// Finds the coin array using the given locators
///
/// Returns the matching locator with its array, or `None` when no location
/// holds an array.
pub fn find_coin_array<'a>(
    body: &'a Value,
    locators: &[CoinLocator],
) -> Option<(CoinLocator, &'a Vec<Value>)> {
    locators
        .iter()
        .find_map(|locator| locator.locate(body).map(|items| (*locator, items)))
}

/// Normalizes a response body into coin snapshots
///
/// An unrecognized shape yields an empty vector. Array elements that are not
/// objects are skipped.
pub fn normalize_coins(body: &Value) -> Vec<CoinSnapshot> {
    let Some((locator, items)) = find_coin_array(body, COIN_LOCATORS) else {
        tracing::debug!("No coin sequence found in response body");
        return Vec::new();
    };

    tracing::trace!(?locator, count = items.len(), "Located coin sequence");

    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(coin) => Some(coin),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable coin entry");
                None
            }
        })
        .collect()
}
