//! GraphQL client implementation for the Shopify Admin API.

use crate::auth::AccessToken;
use crate::clients::graphql::GraphqlError;
use crate::clients::{DataType, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use crate::config::{ApiVersion, ShopDomain};

/// GraphQL client for one shop's Admin API.
///
/// Queries are posted to `{base_uri}/admin/api/{version}/graphql.json`.
#[derive(Debug)]
pub struct GraphqlClient {
    http_client: HttpClient,
    api_version: ApiVersion,
}

// Verify GraphqlClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<GraphqlClient>();
};

impl GraphqlClient {
    /// Creates a client for `https://{shop}`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphqlError::Http`] if the HTTP client cannot be built.
    pub fn new(
        shop: &ShopDomain,
        access_token: &AccessToken,
        api_version: ApiVersion,
    ) -> Result<Self, GraphqlError> {
        Self::with_base_uri(format!("https://{}", shop.as_ref()), access_token, api_version)
    }

    /// Creates a client for an explicit base URI (scheme and host).
    ///
    /// # Errors
    ///
    /// Returns [`GraphqlError::Http`] if the HTTP client cannot be built.
    pub fn with_base_uri(
        base_uri: impl Into<String>,
        access_token: &AccessToken,
        api_version: ApiVersion,
    ) -> Result<Self, GraphqlError> {
        let base_path = format!("/admin/api/{api_version}");
        let http_client = HttpClient::new(base_uri, base_path, access_token)?;

        Ok(Self {
            http_client,
            api_version,
        })
    }

    /// Returns the API version used by this client.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub const fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    /// Executes a query.
    ///
    /// `tries` bounds the HTTP-level retries for 429 and 5xx responses. The
    /// returned body may still contain GraphQL `errors`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphqlError::Http`] for HTTP-level failures.
    pub async fn query(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
        tries: u32,
    ) -> Result<HttpResponse, GraphqlError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables
        });

        let request = HttpRequest::builder(HttpMethod::Post, "graphql.json")
            .body(body)
            .body_type(DataType::Json)
            .tries(tries)
            .build()
            .map_err(|e| GraphqlError::Http(e.into()))?;

        self.http_client.request(request).await.map_err(Into::into)
    }
}
