//! The installation handshake.
//!
//! [`Installer`] sequences the OAuth primitives from [`crate::auth::oauth`]
//! with persistence and diagnostics:
//!
//! - [`Installer::begin_install`] stores a fresh nonce on the shop record and
//!   returns the consent page URL.
//! - [`Installer::handle_callback`] walks the callback strictly in order:
//!
//! ```text
//! START -> PARAMS_CHECKED -> HMAC_VERIFIED -> NONCE_VERIFIED
//!       -> TOKEN_EXCHANGED -> RECORD_PERSISTED -> REDIRECTED
//! ```
//!
//! Every step that fails returns an [`InstallError`] and writes nothing,
//! except that a nonce proven to match is consumed before the exchange.

mod embedded;
mod error;

pub use embedded::embedded_app_url;
pub use error::InstallError;

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::oauth::{
    begin_auth, validate_hmac, CallbackQuery, Nonce, OAuthError, TokenExchanger,
};
use crate::auth::AuthScopes;
use crate::config::{AppConfig, ShopDomain};
use crate::diagnostics::{LogEvent, LogSink, Stage};
use crate::store::{ShopRepository, StoreError};

/// Longest accepted `host` parameter. A real admin context encodes to well
/// under this.
const MAX_HOST_LEN: usize = 255;

/// Runs the install and callback halves of the handshake.
#[derive(Clone)]
pub struct Installer {
    config: Arc<AppConfig>,
    shops: ShopRepository,
    exchanger: Arc<dyn TokenExchanger>,
    log: Arc<dyn LogSink>,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Creates an installer from its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        shops: ShopRepository,
        exchanger: Arc<dyn TokenExchanger>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            config,
            shops,
            exchanger,
            log,
        }
    }

    /// Starts an installation and returns the consent page URL.
    ///
    /// Persists `{shopDomain, pendingNonce, host}` on the shop record; a
    /// second call replaces the nonce of the first.
    ///
    /// # Errors
    ///
    /// - [`InstallError::MissingParameter`], [`InstallError::InvalidParameter`]
    ///   or [`InstallError::InvalidShop`] for bad input, with no side effect
    /// - [`InstallError::Configuration`] when credentials are missing
    /// - [`InstallError::Store`] when the nonce cannot be saved
    pub async fn begin_install(
        &self,
        shop: Option<&str>,
        host: Option<&str>,
    ) -> Result<String, InstallError> {
        let raw_shop = non_empty(shop).ok_or(InstallError::MissingParameter("shop"))?;
        let host = non_empty(host).ok_or(InstallError::MissingParameter("host"))?;
        if host.len() > MAX_HOST_LEN {
            return Err(InstallError::InvalidParameter("host"));
        }
        let shop = ShopDomain::new(raw_shop).map_err(InstallError::InvalidShop)?;

        let auth = match begin_auth(&self.config, &shop) {
            Ok(auth) => auth,
            Err(OAuthError::Config(e)) => {
                tracing::error!(shop = %shop, error = %e, "Install requested without app credentials");
                self.log
                    .append(LogEvent::error(
                        shop.as_ref(),
                        Stage::AuthStartConfig,
                        "App credentials are not configured.",
                    ))
                    .await;
                return Err(InstallError::Configuration(e));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.shops.save_pending_nonce(&shop, &auth.nonce, host).await {
            tracing::error!(shop = %shop, error = %e, "Failed to persist install nonce");
            self.log
                .append(LogEvent::error(
                    shop.as_ref(),
                    Stage::AuthStartStore,
                    format!("Failed to persist install nonce: {e}"),
                ))
                .await;
            return Err(e.into());
        }

        info!(shop = %shop, "Redirecting to consent page");
        Ok(auth.auth_url)
    }

    /// Verifies a callback, stores the token and returns the app URL.
    ///
    /// # Errors
    ///
    /// - 400: [`InstallError::MissingParameter`], [`InstallError::InvalidShop`],
    ///   [`InstallError::InvalidHmac`]
    /// - 403: [`InstallError::StateMismatch`] (also for a replayed callback)
    /// - 500: [`InstallError::Configuration`], [`InstallError::TokenExchange`],
    ///   [`InstallError::Store`]
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Result<String, InstallError> {
        // PARAMS_CHECKED
        let raw_shop = query.shop().ok_or(InstallError::MissingParameter("shop"))?;
        query.hmac().ok_or(InstallError::MissingParameter("hmac"))?;
        let code = query.code().ok_or(InstallError::MissingParameter("code"))?;
        let state = query.state().ok_or(InstallError::MissingParameter("state"))?;

        let credentials = match self.config.credentials() {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::error!(shop = raw_shop, error = %e, "Callback received without app credentials");
                self.log
                    .append(LogEvent::error(
                        raw_shop,
                        Stage::CallbackConfig,
                        "App credentials are not configured.",
                    ))
                    .await;
                return Err(InstallError::Configuration(e));
            }
        };
        debug!(shop = raw_shop, step = "params_checked", "Callback parameters present");

        // HMAC_VERIFIED
        if !validate_hmac(query, credentials) {
            warn!(shop = raw_shop, "Callback HMAC validation failed");
            self.log
                .append(
                    LogEvent::warn(
                        raw_shop,
                        Stage::CallbackHmacFailed,
                        "HMAC validation failed.",
                    )
                    .with_detail(json!({ "receivedHmac": query.hmac() })),
                )
                .await;
            return Err(InstallError::InvalidHmac);
        }
        let shop = ShopDomain::new(raw_shop).map_err(InstallError::InvalidShop)?;
        debug!(shop = %shop, step = "hmac_verified", "Callback signature verified");

        // NONCE_VERIFIED
        let record = match self.shops.get(&shop).await {
            Ok(record) => record,
            Err(e) => return Err(self.store_read_failed(&shop, e).await),
        };
        let pending = record.as_ref().and_then(|r| r.pending_nonce.as_deref());

        let nonce = match pending.map(Nonce::from_raw) {
            Some(nonce) if nonce.matches(state) => nonce,
            _ => {
                return Err(self.state_mismatch(&shop, state, pending).await);
            }
        };
        match self.shops.consume_nonce(&shop, &nonce).await {
            Ok(true) => {}
            Ok(false) => return Err(self.state_mismatch(&shop, state, None).await),
            Err(e) => return Err(self.store_read_failed(&shop, e).await),
        }
        debug!(shop = %shop, step = "nonce_verified", "Install nonce consumed");

        // TOKEN_EXCHANGED
        let token = match self.exchanger.exchange_authorization_code(&shop, code).await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(shop = %shop, error = %e, "Authorization code exchange failed");
                let detail = match &e {
                    OAuthError::TokenExchangeFailed { status, message } => {
                        json!({ "status": status, "responseBody": message })
                    }
                    other => json!({ "error": other.to_string() }),
                };
                self.log
                    .append(
                        LogEvent::error(
                            shop.as_ref(),
                            Stage::CallbackTokenExchange,
                            "Authorization code exchange failed.",
                        )
                        .with_detail(detail),
                    )
                    .await;
                return Err(e.into());
            }
        };
        debug!(shop = %shop, step = "token_exchanged", scopes = %token.scope, "Access token received");
        match token.scope.parse::<AuthScopes>() {
            Ok(granted) if !granted.covers(self.config.scopes()) => {
                warn!(
                    shop = %shop,
                    granted = %granted,
                    requested = %self.config.scopes(),
                    "Granted scopes do not cover the requested scopes"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(shop = %shop, error = %e, "Unparseable granted scopes"),
        }

        // RECORD_PERSISTED
        if let Err(e) = self.shops.store_access_token(&shop, &token, Utc::now()).await {
            tracing::error!(shop = %shop, error = %e, "Failed to persist access token");
            self.log
                .append(LogEvent::error(
                    shop.as_ref(),
                    Stage::CallbackStoreWrite,
                    format!("Failed to persist access token: {e}"),
                ))
                .await;
            return Err(e.into());
        }
        debug!(shop = %shop, step = "record_persisted", "Access token stored");

        // REDIRECTED
        let stored_host = record.as_ref().and_then(|r| r.host.as_deref());
        let target = embedded_app_url(&shop, query.host().or(stored_host));
        info!(shop = %shop, step = "redirected", "Installation complete");
        Ok(target)
    }

    async fn state_mismatch(
        &self,
        shop: &ShopDomain,
        received: &str,
        expected: Option<&str>,
    ) -> InstallError {
        warn!(shop = %shop, "Callback state does not match the pending nonce");
        self.log
            .append(
                LogEvent::warn(
                    shop.as_ref(),
                    Stage::CallbackStateMismatch,
                    "State parameter mismatch.",
                )
                .with_detail(json!({ "received": received, "expected": expected })),
            )
            .await;
        InstallError::StateMismatch
    }

    async fn store_read_failed(&self, shop: &ShopDomain, e: StoreError) -> InstallError {
        tracing::error!(shop = %shop, error = %e, "Failed to read shop record");
        self.log
            .append(LogEvent::error(
                shop.as_ref(),
                Stage::CallbackStoreRead,
                format!("Failed to read shop record: {e}"),
            ))
            .await;
        e.into()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::hmac::compute_signature;
    use crate::auth::AccessTokenResponse;
    use crate::config::{ApiKey, ApiSecretKey, HostUrl};
    use crate::diagnostics::StoreLogSink;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubExchanger {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenExchanger for StubExchanger {
        async fn exchange_authorization_code(
            &self,
            _shop: &ShopDomain,
            _code: &str,
        ) -> Result<AccessTokenResponse, OAuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(json!({"access_token": "tok_123", "scope": "read_products"}))
                .unwrap())
        }
    }

    fn installer(secret: Option<&str>) -> (Installer, Arc<StubExchanger>, ShopRepository) {
        let mut builder = AppConfig::builder().host(HostUrl::new("https://app.example.com").unwrap());
        if let Some(secret) = secret {
            builder = builder
                .api_key(ApiKey::new("key").unwrap())
                .api_secret_key(ApiSecretKey::new(secret).unwrap());
        }
        let store = Arc::new(MemoryStore::new());
        let shops = ShopRepository::new(store.clone());
        let exchanger = Arc::new(StubExchanger::default());
        let installer = Installer::new(
            Arc::new(builder.build().unwrap()),
            shops.clone(),
            exchanger.clone(),
            Arc::new(StoreLogSink::new(store)),
        );
        (installer, exchanger, shops)
    }

    fn signed(pairs: &[(&str, &str)], secret: &str) -> CallbackQuery {
        let mut pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let hmac = compute_signature(
            &CallbackQuery::from_pairs(pairs.clone()).signable_string(),
            secret,
        );
        pairs.push(("hmac".to_string(), hmac));
        CallbackQuery::from_pairs(pairs)
    }

    #[tokio::test]
    async fn test_begin_install_requires_shop_and_host() {
        let (installer, _, shops) = installer(Some("s3cr3t"));

        let result = installer.begin_install(None, Some("h")).await;
        assert!(matches!(result, Err(InstallError::MissingParameter("shop"))));

        let result = installer.begin_install(Some("foo"), Some("  ")).await;
        assert!(matches!(result, Err(InstallError::MissingParameter("host"))));

        let shop = ShopDomain::new("foo").unwrap();
        assert!(shops.get(&shop).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_begin_install_rejects_oversized_host() {
        let (installer, _, shops) = installer(Some("s3cr3t"));

        let host = "A".repeat(4000);
        let result = installer.begin_install(Some("foo"), Some(&host)).await;
        assert!(matches!(result, Err(InstallError::InvalidParameter("host"))));

        let shop = ShopDomain::new("foo").unwrap();
        assert!(shops.get(&shop).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_begin_install_persists_nonce_in_state() {
        let (installer, _, shops) = installer(Some("s3cr3t"));
        let url = installer.begin_install(Some("foo"), Some("aG9zdA")).await.unwrap();

        let shop = ShopDomain::new("foo").unwrap();
        let record = shops.get(&shop).await.unwrap().unwrap();
        let nonce = record.pending_nonce.unwrap();
        assert!(hex::decode(&nonce).unwrap().len() >= 16);
        assert!(url.ends_with(&format!("state={nonce}")));
        assert_eq!(record.host.as_deref(), Some("aG9zdA"));
    }

    #[tokio::test]
    async fn test_callback_happy_path() {
        let (installer, exchanger, shops) = installer(Some("s3cr3t"));
        let shop = ShopDomain::new("foo.myshopify.com").unwrap();
        shops
            .save_pending_nonce(&shop, &Nonce::from_raw("n1"), "h")
            .await
            .unwrap();

        let query = signed(
            &[("shop", "foo.myshopify.com"), ("code", "abc"), ("state", "n1")],
            "s3cr3t",
        );
        let target = installer.handle_callback(&query).await.unwrap();

        assert_eq!(target, "https://foo.myshopify.com/admin/apps/snapify");
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
        let record = shops.get(&shop).await.unwrap().unwrap();
        assert!(record.is_active);
        assert_eq!(record.active_token().map(AsRef::as_ref), Some("tok_123"));
        assert!(record.pending_nonce.is_none());
    }

    #[tokio::test]
    async fn test_callback_rejects_invalid_shop_after_hmac() {
        let (installer, exchanger, _) = installer(Some("s3cr3t"));
        let query = signed(
            &[("shop", "evil.example.com"), ("code", "abc"), ("state", "n1")],
            "s3cr3t",
        );
        let result = installer.handle_callback(&query).await;
        assert!(matches!(result, Err(InstallError::InvalidShop(_))));
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_without_pending_nonce_is_forbidden() {
        let (installer, exchanger, _) = installer(Some("s3cr3t"));
        let query = signed(
            &[("shop", "foo.myshopify.com"), ("code", "abc"), ("state", "n1")],
            "s3cr3t",
        );
        let result = installer.handle_callback(&query).await;
        assert!(matches!(result, Err(InstallError::StateMismatch)));
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some(" a ")), Some("a"));
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(None), None);
    }
}
