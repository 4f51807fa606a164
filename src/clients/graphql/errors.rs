//! GraphQL-specific error types.
//!
//! - [`GraphqlError::Http`]: wraps underlying HTTP errors
//! - [`GraphqlError::Query`]: the response carried top-level `errors`
//!
//! A `THROTTLED` response is not an error at this level; callers inspect
//! the body and back off.

use crate::clients::HttpError;
use thiserror::Error;

/// Errors from GraphQL operations.
#[derive(Debug, Error)]
pub enum GraphqlError {
    /// HTTP-level failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// GraphQL-level failure reported with HTTP 200.
    #[error("GraphQL query failed: {message}")]
    Query {
        /// Serialized `errors` array.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::HttpResponseError;

    #[test]
    fn test_graphql_error_http_variant_wraps_http_error() {
        let http_error = HttpError::Response(HttpResponseError {
            code: 404,
            message: r#"{"errors":"Not Found"}"#.to_string(),
            error_reference: Some("abc-123".to_string()),
        });

        let graphql_error: GraphqlError = http_error.into();
        assert!(graphql_error.to_string().contains("Not Found"));
        assert!(matches!(graphql_error, GraphqlError::Http(_)));
    }

    #[test]
    fn test_query_error_message() {
        let error = GraphqlError::Query {
            message: r#"[{"message":"Field 'foo' doesn't exist"}]"#.to_string(),
        };
        assert!(error.to_string().starts_with("GraphQL query failed"));
    }
}
