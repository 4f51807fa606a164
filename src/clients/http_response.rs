//! HTTP response type.

use std::collections::HashMap;
use std::time::Duration;

/// A parsed Admin API response.
///
/// Header names are lowercased. The body is parsed as JSON; an empty body
/// becomes `{}`.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub code: u16,
    /// Response headers, lowercased, with every value kept.
    pub headers: HashMap<String, Vec<String>>,
    /// Parsed JSON body.
    pub body: serde_json::Value,
    /// Seconds to wait before retrying, from `Retry-After`.
    pub retry_request_after: Option<f64>,
}

impl HttpResponse {
    /// Creates a response and parses the `Retry-After` header.
    #[must_use]
    pub fn new(code: u16, headers: HashMap<String, Vec<String>>, body: serde_json::Value) -> Self {
        let retry_request_after = headers
            .get("retry-after")
            .and_then(|values| values.first())
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0);

        Self {
            code,
            headers,
            body,
            retry_request_after,
        }
    }

    /// Returns `true` for 2xx responses.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code >= 200 && self.code <= 299
    }

    /// Returns the `X-Request-Id` header.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get("x-request-id")
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns `Retry-After` as a duration.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_request_after.map(Duration::from_secs_f64)
    }

    /// Returns the deprecation reason, if Shopify flagged the request.
    #[must_use]
    pub fn deprecation_reason(&self) -> Option<&str> {
        self.headers
            .get("x-shopify-api-deprecated-reason")
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}
