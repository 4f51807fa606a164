//! HTTP error types for the Admin API client.
//!
//! - [`HttpResponseError`]: non-2xx HTTP responses from the API
//! - [`MaxHttpRetriesExceededError`]: retry attempts are exhausted
//! - [`InvalidHttpRequestError`]: a request fails validation before sending
//! - [`HttpError`]: unified error type for all of the above plus transport errors

use thiserror::Error;

/// Error returned for a non-2xx response that is not retried.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpResponseError {
    /// The HTTP status code.
    pub code: u16,
    /// Serialized error body.
    pub message: String,
    /// The `X-Request-Id` of the failed request, if any.
    pub error_reference: Option<String>,
}

/// Error returned when a retryable status persisted across every try.
#[derive(Debug, Error)]
#[error("Exceeded maximum retry count of {tries}. Last message: {message}")]
pub struct MaxHttpRetriesExceededError {
    /// The HTTP status code of the last response.
    pub code: u16,
    /// Number of tries made.
    pub tries: u32,
    /// Serialized error body of the last response.
    pub message: String,
    /// The `X-Request-Id` of the last response, if any.
    pub error_reference: Option<String>,
}

/// Request validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidHttpRequestError {
    /// A body was set without a body type.
    #[error("Cannot set a body without also setting body_type.")]
    MissingBodyType,

    /// A POST request has no body.
    #[error("Cannot use {method} without specifying data.")]
    MissingBody {
        /// The HTTP method.
        method: String,
    },
}

/// Unified HTTP error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-2xx response.
    #[error(transparent)]
    Response(#[from] HttpResponseError),

    /// Retries exhausted.
    #[error(transparent)]
    MaxRetries(#[from] MaxHttpRetriesExceededError),

    /// The request failed validation.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidHttpRequestError),

    /// Transport error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl HttpError {
    /// Returns the HTTP status of the failed response, if there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response(e) => Some(e.code),
            Self::MaxRetries(e) => Some(e.code),
            Self::InvalidRequest(_) | Self::Network(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_response_error_displays_message() {
        let error = HttpResponseError {
            code: 404,
            message: r#"{"errors":"Not Found"}"#.to_string(),
            error_reference: None,
        };
        assert_eq!(error.to_string(), r#"{"errors":"Not Found"}"#);
    }

    #[test]
    fn test_max_retries_error_includes_retry_count() {
        let error = MaxHttpRetriesExceededError {
            code: 429,
            tries: 3,
            message: r#"{"errors":"Throttled"}"#.to_string(),
            error_reference: None,
        };
        let message = error.to_string();
        assert!(message.contains('3'));
        assert!(message.contains("Exceeded maximum retry count"));
    }

    #[test]
    fn test_invalid_request_error_messages() {
        assert_eq!(
            InvalidHttpRequestError::MissingBody {
                method: "post".to_string()
            }
            .to_string(),
            "Cannot use post without specifying data."
        );
        assert!(InvalidHttpRequestError::MissingBodyType
            .to_string()
            .contains("body_type"));
    }

    #[test]
    fn test_http_error_status() {
        let error: HttpError = HttpResponseError {
            code: 401,
            message: String::new(),
            error_reference: None,
        }
        .into();
        assert_eq!(error.status(), Some(401));

        let error: HttpError = InvalidHttpRequestError::MissingBodyType.into();
        assert_eq!(error.status(), None);
    }
}
