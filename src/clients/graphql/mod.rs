//! GraphQL client for the Shopify Admin API.
//!
//! - [`GraphqlClient`]: posts queries to `graphql.json` through
//!   [`HttpClient`](crate::clients::HttpClient)
//! - [`QueryCost`] / [`ThrottleStatus`]: the calculated query cost Shopify
//!   reports under `extensions.cost`, used to pace paginated reads
//! - [`GraphqlError`]: error type for GraphQL operations
//!
//! # Response Structure
//!
//! GraphQL responses contain these fields in the body:
//!
//! - `data`: The query result data
//! - `errors`: GraphQL errors (still HTTP 200), including `THROTTLED`
//! - `extensions`: Query cost information
//!
//! # Example
//!
//! ```rust,ignore
//! use snapify::clients::GraphqlClient;
//! use serde_json::json;
//!
//! let client = GraphqlClient::new(&shop, &access_token, ApiVersion::latest())?;
//! let response = client
//!     .query("query { shop { name } }", Some(json!({})), 3)
//!     .await?;
//! println!("Shop name: {}", response.body["data"]["shop"]["name"]);
//! ```

mod client;
mod cost;
mod errors;

pub use client::GraphqlClient;
pub use cost::{is_throttled, QueryCost, ThrottleStatus, MAX_THROTTLE_WAIT};
pub use errors::GraphqlError;
