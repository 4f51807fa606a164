//! Authorization code exchange.
//!
//! After a verified callback, the one-time authorization `code` is posted to
//! `https://{shop}/admin/oauth/access_token` together with the app
//! credentials, and Shopify answers with an offline access token.
//!
//! The exchange sits behind the [`TokenExchanger`] trait so the install flow
//! can be driven against a stub. [`ShopifyTokenExchanger`] is the production
//! implementation.
//!
//! Codes are single-use, so a failed exchange is reported and never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::auth::oauth::OAuthError;
use crate::auth::AccessTokenResponse;
use crate::config::{AppConfig, ShopDomain};

/// Exchanges an authorization code for an access token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Performs exactly one exchange attempt for `code` on `shop`.
    ///
    /// # Errors
    ///
    /// Returns an [`OAuthError`] when the endpoint rejects the code, cannot
    /// be reached, or does not answer in time.
    async fn exchange_authorization_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessTokenResponse, OAuthError>;
}

#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

/// [`TokenExchanger`] that talks to the shop's token endpoint over HTTPS.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use snapify::auth::oauth::{ShopifyTokenExchanger, TokenExchanger};
///
/// let exchanger = ShopifyTokenExchanger::new(Arc::clone(&config))?;
/// let token = exchanger.exchange_authorization_code(&shop, "code").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ShopifyTokenExchanger {
    config: Arc<AppConfig>,
    client: reqwest::Client,
    base_url: Option<String>,
}

impl ShopifyTokenExchanger {
    /// Creates an exchanger using the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::TokenExchangeFailed`] if the HTTP client cannot
    /// be built.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.token_exchange_timeout())
            .build()
            .map_err(|e| OAuthError::TokenExchangeFailed {
                status: 0,
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            client,
            base_url: None,
        })
    }

    /// Sends requests to `base_url` instead of `https://{shop}`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn token_url(&self, shop: &ShopDomain) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/admin/oauth/access_token"),
            None => format!("https://{}/admin/oauth/access_token", shop.as_ref()),
        }
    }

    fn timeout(&self) -> Duration {
        self.config.token_exchange_timeout()
    }
}

#[async_trait]
impl TokenExchanger for ShopifyTokenExchanger {
    async fn exchange_authorization_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessTokenResponse, OAuthError> {
        let credentials = self.config.credentials()?;
        let token_url = self.token_url(shop);

        let request_body = TokenExchangeRequest {
            client_id: credentials.api_key().as_ref(),
            client_secret: credentials.api_secret_key().as_ref(),
            code,
        };

        tracing::debug!(shop = %shop, "Exchanging authorization code");

        let response = self
            .client
            .post(&token_url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OAuthError::TokenExchangeTimeout(self.timeout())
                } else {
                    OAuthError::TokenExchangeFailed {
                        status: 0,
                        message: format!("Network error: {e}"),
                    }
                }
            })?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchangeFailed {
                status,
                message: error_body,
            });
        }

        let token_response: AccessTokenResponse =
            response
                .json()
                .await
                .map_err(|e| OAuthError::TokenExchangeFailed {
                    status,
                    message: format!("Failed to parse token response: {e}"),
                })?;

        if token_response.access_token.is_empty() {
            return Err(OAuthError::TokenExchangeFailed {
                status,
                message: "Token response contained an empty access token".to_string(),
            });
        }

        Ok(token_response)
    }
}

// Verify ShopifyTokenExchanger is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShopifyTokenExchanger>();
};
