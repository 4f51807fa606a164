//! Route handlers.
//!
//! Failures answer with a generic message. The detail has already been
//! logged by the service that produced the error.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::auth::oauth::CallbackQuery;
use crate::install::InstallError;
use crate::products::ProductError;
use crate::server::AppState;

/// Query of `/auth`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthParams {
    /// Shop to install on.
    pub shop: Option<String>,
    /// Base64 admin context from Shopify.
    pub host: Option<String>,
}

/// Query of `/products` and body of `/products/sync`.
#[derive(Debug, Default, Deserialize)]
pub struct ShopParams {
    /// Shop whose products are requested.
    pub shop: Option<String>,
}

impl IntoResponse for InstallError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, status = status.as_u16(), "Install request rejected");
        (status, self.public_message()).into_response()
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, status = status.as_u16(), "Products request rejected");
        (status, self.public_message()).into_response()
    }
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET|POST /auth - Redirect the merchant to the consent page.
#[instrument(skip(state))]
pub async fn auth(State(state): State<AppState>, Query(params): Query<AuthParams>) -> Response {
    match state
        .installer()
        .begin_install(params.shop.as_deref(), params.host.as_deref())
        .await
    {
        Ok(auth_url) => found(&auth_url),
        Err(e) => e.into_response(),
    }
}

/// GET /auth/callback - Finish the installation.
#[instrument(skip(state, pairs))]
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = CallbackQuery::from_pairs(pairs);
    match state.installer().handle_callback(&query).await {
        Ok(app_url) => found(&app_url),
        Err(e) => e.into_response(),
    }
}

/// POST /products/sync - Mirror the shop's catalog.
#[instrument(skip(state))]
pub async fn sync_products(
    State(state): State<AppState>,
    Json(params): Json<ShopParams>,
) -> Response {
    match state.products().sync(params.shop.as_deref()).await {
        Ok(summary) => Json(json!({
            "success": true,
            "message": summary.message(),
        }))
        .into_response(),
        Err(e) => {
            let status = e.status();
            tracing::debug!(error = %e, status = status.as_u16(), "Product sync rejected");
            (
                status,
                Json(json!({
                    "success": false,
                    "message": e.public_message(),
                })),
            )
                .into_response()
        }
    }
}

/// GET /products - List the mirrored catalog.
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ShopParams>,
) -> Response {
    match state.products().list(params.shop.as_deref()).await {
        Ok(products) => Json(json!({ "products": products })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_install_error_response_is_generic() {
        let response = InstallError::Configuration(ConfigError::MissingCredentials).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = InstallError::StateMismatch.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_product_error_response() {
        let response = ProductError::NotInstalled.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_found_sets_location() {
        let response = found("https://foo.myshopify.com/admin/oauth/authorize");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://foo.myshopify.com/admin/oauth/authorize"
        );
    }
}
