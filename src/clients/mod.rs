//! Admin API client types.
//!
//! This module provides the HTTP layer used to read a shop's catalog after
//! installation:
//!
//! - [`HttpClient`]: the async HTTP client, authenticated with the shop's
//!   access token
//! - [`HttpRequest`] / [`HttpResponse`]: one call and its parsed result
//! - [`graphql::GraphqlClient`]: Admin GraphQL API client
//! - [`graphql::QueryCost`]: calculated query cost used for pacing
//!
//! # Retry Behavior
//!
//! - **429 (Rate Limited)**: retries after `Retry-After`, or 1 second if absent
//! - **5xx (Server Error)**: retries with a fixed 1-second delay
//! - **Other errors (4xx)**: returned immediately
//!
//! The default `tries` is 1, meaning no automatic retries.

mod errors;
pub mod graphql;
mod http_client;
mod http_request;
mod http_response;

pub use errors::{
    HttpError, HttpResponseError, InvalidHttpRequestError, MaxHttpRetriesExceededError,
};
pub use http_client::{HttpClient, APP_VERSION};
pub use http_request::{DataType, HttpMethod, HttpRequest, HttpRequestBuilder};
pub use http_response::HttpResponse;

pub use graphql::{GraphqlClient, GraphqlError};
