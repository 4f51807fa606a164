//! Product catalog mirror.
//!
//! [`ProductSync::sync`] reads every product of an installed shop through
//! the Admin GraphQL API, one page of 250 at a time, and stores each node
//! unchanged under `shops/{shop}/products/{id}` where `id` is the numeric
//! tail of the product GID. [`ProductSync::list`] serves the mirror back.
//!
//! Pagination is paced by the cost report of each page: when the bucket
//! cannot cover another page the loop sleeps until it can. HTTP 429 is
//! retried by the client after `Retry-After`.

mod error;

pub use error::ProductError;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::auth::AccessToken;
use crate::clients::graphql::{is_throttled, GraphqlClient, GraphqlError, QueryCost};
use crate::config::{AppConfig, ShopDomain};
use crate::diagnostics::{LogEvent, LogSink, Stage};
use crate::store::{Document, ShopRepository};

/// Products requested per page.
pub const PAGE_SIZE: u32 = 250;

/// HTTP attempts per page for 429 and 5xx answers.
const HTTP_TRIES: u32 = 3;

/// Consecutive `THROTTLED` answers tolerated for one page.
const MAX_THROTTLED_ATTEMPTS: u32 = 5;

/// Wait used when a throttled answer carries no cost report.
const DEFAULT_THROTTLE_WAIT: Duration = Duration::from_secs(1);

const PRODUCTS_QUERY: &str = r"
query getProducts($first: Int!, $after: String) {
  products(first: $first, after: $after) {
    edges {
      cursor
      node {
        id
        title
        descriptionHtml
        images(first: 10) {
          edges {
            node {
              url
              altText
            }
          }
        }
        variants(first: 10) {
          edges {
            node {
              id
              title
              price
              sku
            }
          }
        }
      }
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductsPage {
    edges: Vec<ProductEdge>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct ProductEdge {
    cursor: String,
    node: Document,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Outcome of a sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncSummary {
    /// Number of products written.
    pub synced: usize,
}

impl SyncSummary {
    /// Message returned to the embedded UI.
    #[must_use]
    pub fn message(&self) -> String {
        if self.synced == 0 {
            "No products found in Shopify.".to_string()
        } else {
            format!("Synced {} products successfully.", self.synced)
        }
    }
}

/// Mirrors and lists a shop's products.
#[derive(Clone)]
pub struct ProductSync {
    config: Arc<AppConfig>,
    shops: ShopRepository,
    log: Arc<dyn LogSink>,
    api_base_uri: Option<String>,
}

impl std::fmt::Debug for ProductSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductSync")
            .field("api_base_uri", &self.api_base_uri)
            .finish_non_exhaustive()
    }
}

impl ProductSync {
    /// Creates the product mirror.
    #[must_use]
    pub fn new(config: Arc<AppConfig>, shops: ShopRepository, log: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            shops,
            log,
            api_base_uri: None,
        }
    }

    /// Sends Admin API calls to `base_uri` instead of `https://{shop}`.
    #[must_use]
    pub fn with_api_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.api_base_uri = Some(base_uri.into());
        self
    }

    /// Pulls every product of `shop` and stores it.
    ///
    /// Nothing is written unless every page was read. `productsSyncedAt` is
    /// stamped when at least one product was stored.
    ///
    /// # Errors
    ///
    /// - [`ProductError::MissingShop`] / [`ProductError::InvalidShop`]
    /// - [`ProductError::NotInstalled`] when the shop has no active token
    /// - [`ProductError::Graphql`], [`ProductError::MalformedResponse`],
    ///   [`ProductError::Throttled`] for Admin API failures
    /// - [`ProductError::Store`] when a write fails
    pub async fn sync(&self, shop: Option<&str>) -> Result<SyncSummary, ProductError> {
        let shop = parse_shop(shop)?;
        let result = self.sync_shop(&shop).await;

        if let Err(e) = &result {
            if e.status().is_server_error() {
                tracing::error!(shop = %shop, error = %e, "Product sync failed");
                self.log
                    .append(LogEvent::error(shop.as_ref(), Stage::ProductSync, e.to_string()))
                    .await;
            }
        }
        result
    }

    /// Lists the mirrored products, each with its `id`.
    ///
    /// # Errors
    ///
    /// - [`ProductError::MissingShop`] / [`ProductError::InvalidShop`]
    /// - [`ProductError::NotInstalled`] when the shop has no active token
    /// - [`ProductError::Store`] when the read fails
    pub async fn list(&self, shop: Option<&str>) -> Result<Vec<Value>, ProductError> {
        let shop = parse_shop(shop)?;
        let result = self.list_shop(&shop).await;

        if let Err(e) = &result {
            if e.status().is_server_error() {
                tracing::error!(shop = %shop, error = %e, "Product listing failed");
                self.log
                    .append(LogEvent::error(shop.as_ref(), Stage::ProductList, e.to_string()))
                    .await;
            }
        }
        result
    }

    async fn access_token(&self, shop: &ShopDomain) -> Result<AccessToken, ProductError> {
        self.shops
            .get(shop)
            .await?
            .and_then(|record| record.active_token().cloned())
            .ok_or(ProductError::NotInstalled)
    }

    async fn sync_shop(&self, shop: &ShopDomain) -> Result<SyncSummary, ProductError> {
        let token = self.access_token(shop).await?;
        let client = self.client(shop, &token)?;

        let products = fetch_all_products(&client, shop).await?;
        if products.is_empty() {
            info!(shop = %shop, "No products to sync");
            return Ok(SyncSummary { synced: 0 });
        }

        for (id, product) in &products {
            self.shops.save_product(shop, id, product.clone()).await?;
        }
        self.shops.mark_products_synced(shop, Utc::now()).await?;

        info!(shop = %shop, count = products.len(), "Products synced");
        Ok(SyncSummary {
            synced: products.len(),
        })
    }

    async fn list_shop(&self, shop: &ShopDomain) -> Result<Vec<Value>, ProductError> {
        self.access_token(shop).await?;

        let products = self
            .shops
            .list_products(shop)
            .await?
            .into_iter()
            .map(|(id, mut product)| {
                product.insert("id".to_string(), Value::String(id));
                Value::Object(product)
            })
            .collect();
        Ok(products)
    }

    fn client(&self, shop: &ShopDomain, token: &AccessToken) -> Result<GraphqlClient, GraphqlError> {
        let version = self.config.api_version().clone();
        match &self.api_base_uri {
            Some(base_uri) => GraphqlClient::with_base_uri(base_uri.clone(), token, version),
            None => GraphqlClient::new(shop, token, version),
        }
    }
}

fn parse_shop(shop: Option<&str>) -> Result<ShopDomain, ProductError> {
    let shop = shop
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ProductError::MissingShop)?;
    ShopDomain::new(shop).map_err(ProductError::InvalidShop)
}

/// Returns the numeric tail of a GID such as `gid://shopify/Product/123`.
fn product_id(node: &Document) -> Option<String> {
    let gid = node.get("id")?.as_str()?;
    gid.rsplit('/')
        .next()
        .filter(|tail| !tail.is_empty())
        .map(String::from)
}

async fn fetch_all_products(
    client: &GraphqlClient,
    shop: &ShopDomain,
) -> Result<Vec<(String, Document)>, ProductError> {
    let mut products = Vec::new();
    let mut cursor: Option<String> = None;
    let mut throttled_attempts = 0;

    loop {
        let variables = json!({ "first": PAGE_SIZE, "after": cursor });
        let response = client
            .query(PRODUCTS_QUERY, Some(variables), HTTP_TRIES)
            .await?;
        let cost = QueryCost::from_body(&response.body);

        if is_throttled(&response.body) {
            throttled_attempts += 1;
            if throttled_attempts > MAX_THROTTLED_ATTEMPTS {
                return Err(ProductError::Throttled {
                    attempts: MAX_THROTTLED_ATTEMPTS,
                });
            }
            let wait = cost
                .as_ref()
                .and_then(QueryCost::wait_to_repeat)
                .unwrap_or(DEFAULT_THROTTLE_WAIT);
            warn!(shop = %shop, wait_ms = duration_ms(wait), "Products query throttled");
            tokio::time::sleep(wait).await;
            continue;
        }
        throttled_attempts = 0;

        if let Some(errors) = response.body.get("errors") {
            return Err(GraphqlError::Query {
                message: errors.to_string(),
            }
            .into());
        }

        let page_value = response
            .body
            .pointer("/data/products")
            .cloned()
            .ok_or_else(|| ProductError::MalformedResponse {
                reason: "missing data.products".to_string(),
            })?;
        let page: ProductsPage =
            serde_json::from_value(page_value).map_err(|e| ProductError::MalformedResponse {
                reason: e.to_string(),
            })?;

        let last_cursor = page.edges.last().map(|edge| edge.cursor.clone());
        for edge in page.edges {
            let id = product_id(&edge.node).ok_or_else(|| ProductError::MalformedResponse {
                reason: "product node without id".to_string(),
            })?;
            products.push((id, edge.node));
        }
        debug!(shop = %shop, fetched = products.len(), "Fetched products page");

        if !page.page_info.has_next_page {
            return Ok(products);
        }
        cursor = page.page_info.end_cursor.or(last_cursor);
        if cursor.is_none() {
            return Err(ProductError::MalformedResponse {
                reason: "next page without cursor".to_string(),
            });
        }

        if let Some(wait) = cost.as_ref().and_then(QueryCost::wait_to_repeat) {
            debug!(shop = %shop, wait_ms = duration_ms(wait), "Waiting for query budget");
            tokio::time::sleep(wait).await;
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
