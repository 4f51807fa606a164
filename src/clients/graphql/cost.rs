//! GraphQL calculated query cost.
//!
//! Shopify rate limits the Admin GraphQL API with a leaky bucket of cost
//! points. Every response reports the bucket under `extensions.cost`:
//!
//! ```json
//! {
//!   "requestedQueryCost": 252,
//!   "actualQueryCost": 42,
//!   "throttleStatus": {
//!     "maximumAvailable": 2000.0,
//!     "currentlyAvailable": 1958,
//!     "restoreRate": 100.0
//!   }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Longest wait derived from a cost report.
pub const MAX_THROTTLE_WAIT: Duration = Duration::from_secs(60);

/// State of the cost bucket after a query.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStatus {
    /// Bucket size.
    pub maximum_available: f64,
    /// Points left in the bucket.
    pub currently_available: f64,
    /// Points restored per second.
    pub restore_rate: f64,
}

/// Cost report of one GraphQL query.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCost {
    /// Points reserved before the query ran.
    pub requested_query_cost: f64,
    /// Points actually spent. Absent when the query was throttled.
    #[serde(default)]
    pub actual_query_cost: Option<f64>,
    /// Bucket state after the query.
    pub throttle_status: ThrottleStatus,
}

impl QueryCost {
    /// Extracts the cost report from a response body.
    #[must_use]
    pub fn from_body(body: &serde_json::Value) -> Option<Self> {
        body.pointer("/extensions/cost")
            .and_then(|cost| serde_json::from_value(cost.clone()).ok())
    }

    /// Time to wait until the bucket holds `next_cost` points.
    ///
    /// Returns `None` when enough points are already available. The wait is
    /// clamped to [`MAX_THROTTLE_WAIT`].
    #[must_use]
    pub fn wait_for(&self, next_cost: f64) -> Option<Duration> {
        let status = &self.throttle_status;
        let missing = next_cost.min(status.maximum_available) - status.currently_available;
        if missing <= 0.0 || status.restore_rate <= 0.0 {
            return None;
        }
        let wait = Duration::try_from_secs_f64(missing / status.restore_rate)
            .map_or(MAX_THROTTLE_WAIT, |wait| wait.min(MAX_THROTTLE_WAIT));
        Some(wait)
    }

    /// Time to wait before repeating this same query.
    #[must_use]
    pub fn wait_to_repeat(&self) -> Option<Duration> {
        self.wait_for(self.requested_query_cost)
    }
}

/// Returns `true` if the body carries a `THROTTLED` GraphQL error.
#[must_use]
pub fn is_throttled(body: &serde_json::Value) -> bool {
    body.get("errors")
        .and_then(serde_json::Value::as_array)
        .is_some_and(|errors| {
            errors.iter().any(|error| {
                error.pointer("/extensions/code").and_then(serde_json::Value::as_str)
                    == Some("THROTTLED")
            })
        })
}
