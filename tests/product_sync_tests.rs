//! Integration tests for the product mirror.
//!
//! A `wiremock` server plays the Admin GraphQL API; the mirror is checked
//! through the `/products/sync` and `/products` routes and the store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use snapify::auth::oauth::{OAuthError, TokenExchanger};
use snapify::auth::AccessTokenResponse;
use snapify::diagnostics::{StoreLogSink, LOGS_COLLECTION};
use snapify::install::Installer;
use snapify::products::{ProductError, ProductSync};
use snapify::server::{self, AppState};
use snapify::store::{DocumentStore, MemoryStore, ShopRepository};
use snapify::{AppConfig, HostUrl, ShopDomain};
use tokio_test::assert_ok;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHOP: &str = "foo.myshopify.com";
const GRAPHQL_PATH: &str = "/admin/api/2025-10/graphql.json";

struct UnusedExchanger;

#[async_trait::async_trait]
impl TokenExchanger for UnusedExchanger {
    async fn exchange_authorization_code(
        &self,
        _shop: &ShopDomain,
        _code: &str,
    ) -> Result<AccessTokenResponse, OAuthError> {
        panic!("product routes never exchange codes")
    }
}

struct TestApp {
    router: Router,
    products: ProductSync,
    store: Arc<MemoryStore>,
    shops: ShopRepository,
}

fn test_app(server: &MockServer) -> TestApp {
    let config = Arc::new(
        AppConfig::builder()
            .host(HostUrl::new("https://app.example.com").unwrap())
            .build()
            .unwrap(),
    );
    let store = Arc::new(MemoryStore::new());
    let shops = ShopRepository::new(store.clone());
    let log = Arc::new(StoreLogSink::new(store.clone()));

    let installer = Installer::new(
        config.clone(),
        shops.clone(),
        Arc::new(UnusedExchanger),
        log.clone(),
    );
    let products = ProductSync::new(config, shops.clone(), log).with_api_base_uri(server.uri());
    let router = server::router(AppState::new(installer, products.clone()));

    TestApp {
        router,
        products,
        store,
        shops,
    }
}

fn shop() -> ShopDomain {
    ShopDomain::new(SHOP).unwrap()
}

async fn install(shops: &ShopRepository) {
    let token: AccessTokenResponse = serde_json::from_value(json!({
        "access_token": "tok_123",
        "scope": "read_products"
    }))
    .unwrap();
    shops
        .store_access_token(&shop(), &token, Utc::now())
        .await
        .unwrap();
}

fn product(id: u64, title: &str) -> Value {
    json!({
        "id": format!("gid://shopify/Product/{id}"),
        "title": title,
        "descriptionHtml": "<p>x</p>",
        "images": { "edges": [] },
        "variants": { "edges": [] }
    })
}

fn page(products: &[Value], next: Option<&str>) -> Value {
    let edges: Vec<Value> = products
        .iter()
        .enumerate()
        .map(|(i, node)| json!({ "cursor": format!("edge-{i}"), "node": node }))
        .collect();
    json!({
        "data": {
            "products": {
                "edges": edges,
                "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
            }
        },
        "extensions": {
            "cost": {
                "requestedQueryCost": 100,
                "actualQueryCost": 20,
                "throttleStatus": {
                    "maximumAvailable": 1000,
                    "currentlyAvailable": 980,
                    "restoreRate": 50
                }
            }
        }
    })
}

fn throttled() -> Value {
    json!({
        "errors": [{
            "message": "Throttled",
            "extensions": { "code": "THROTTLED" }
        }],
        "extensions": {
            "cost": {
                "requestedQueryCost": 100,
                "throttleStatus": {
                    "maximumAvailable": 1000,
                    "currentlyAvailable": 99.5,
                    "restoreRate": 50
                }
            }
        }
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn sync_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/products/sync")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn list_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Sync
// ============================================================================

#[tokio::test]
async fn test_sync_walks_every_page() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header_eq("x-shopify-access-token", "tok_123"))
        .and(body_partial_json(json!({ "variables": { "first": 250, "after": null } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &[product(1, "Mug"), product(2, "Shirt")],
            Some("cursor-1"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({ "variables": { "after": "cursor-1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[product(3, "Poster")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(&app.router, sync_request(&json!({ "shop": SHOP }))).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        body,
        json!({ "success": true, "message": "Synced 3 products successfully." })
    );

    let stored = app.shops.list_products(&shop()).await.unwrap();
    let ids: Vec<&str> = stored.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(stored[2].1["title"], "Poster");
    assert_eq!(stored[0].1["id"], "gid://shopify/Product/1");

    let record = app.shops.get(&shop()).await.unwrap().unwrap();
    assert!(record.products_synced_at.is_some());
}

#[tokio::test]
async fn test_sync_with_empty_catalog() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[], None)))
        .mount(&server)
        .await;

    let summary = assert_ok!(app.products.sync(Some(SHOP)).await);
    assert_eq!(summary.synced, 0);
    assert_eq!(summary.message(), "No products found in Shopify.");

    let record = app.shops.get(&shop()).await.unwrap().unwrap();
    assert!(record.products_synced_at.is_none());
}

#[tokio::test]
async fn test_sync_waits_out_throttling() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(throttled()))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[product(7, "Cap")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let summary = assert_ok!(app.products.sync(Some(SHOP)).await);
    assert_eq!(summary.synced, 1);
}

#[tokio::test]
async fn test_sync_gives_up_when_always_throttled() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(throttled()))
        .mount(&server)
        .await;

    let result = app.products.sync(Some(SHOP)).await;
    assert!(matches!(result, Err(ProductError::Throttled { .. })));
    assert!(app.shops.list_products(&shop()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_retries_after_rate_limit() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[product(9, "Bag")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let summary = assert_ok!(app.products.sync(Some(SHOP)).await);
    assert_eq!(summary.synced, 1);
}

#[tokio::test]
async fn test_sync_query_error_is_logged_and_nothing_stored() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Field 'nope' doesn't exist" }]
        })))
        .mount(&server)
        .await;

    let (status, body) = send(&app.router, sync_request(&json!({ "shop": SHOP }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], false);
    assert!(!body["message"].as_str().unwrap().contains("nope"));

    assert!(app.shops.list_products(&shop()).await.unwrap().is_empty());
    let logs = app.store.list(LOGS_COLLECTION).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].1["stage"], "product_sync");
}

#[tokio::test]
async fn test_sync_requires_shop() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let (status, body) = send(&app.router, sync_request(&json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({ "success": false, "message": "Missing shop parameter." }));
}

#[tokio::test]
async fn test_sync_requires_installed_shop() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let (status, _) = send(&app.router, sync_request(&json!({ "shop": SHOP }))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_returns_products_with_ids() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    for (id, title) in [("2", "Shirt"), ("1", "Mug")] {
        let Value::Object(doc) = json!({ "title": title }) else {
            unreachable!()
        };
        app.shops.save_product(&shop(), id, doc).await.unwrap();
    }

    let (status, body) = send(&app.router, list_request("/products?shop=foo.myshopify.com")).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        body,
        json!({ "products": [
            { "id": "1", "title": "Mug" },
            { "id": "2", "title": "Shirt" }
        ]})
    );
}

#[tokio::test]
async fn test_list_empty_catalog() {
    let server = MockServer::start().await;
    let app = test_app(&server);
    install(&app.shops).await;

    let (status, body) = send(&app.router, list_request("/products?shop=foo")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({ "products": [] })
    );
}

#[tokio::test]
async fn test_list_without_token_is_unauthorized() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let (status, body) = send(&app.router, list_request("/products?shop=foo")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Authentication required.");
}

#[tokio::test]
async fn test_list_requires_shop() {
    let server = MockServer::start().await;
    let app = test_app(&server);

    let (status, body) = send(&app.router, list_request("/products")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing shop parameter.");
}
