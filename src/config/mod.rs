//! Application configuration.
//!
//! The configuration is built once at process start and shared by reference
//! with every handler; nothing reads secrets from globals at request time.
//!
//! - [`AppConfig`]: all settings the service needs
//! - [`AppConfigBuilder`]: builder for [`AppConfig`]
//! - [`AppCredentials`]: the confidential app identifier and secret(s)
//! - [`ApiKey`], [`ApiSecretKey`], [`ShopDomain`], [`HostUrl`]: validated newtypes
//! - [`ApiVersion`]: Admin API version used by the product mirror
//!
//! # Example
//!
//! ```rust
//! use snapify::{AppConfig, ApiKey, ApiSecretKey, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .host(HostUrl::new("https://app.example.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.redirect_uri(), "https://app.example.com/auth/callback");
//! assert!(config.credentials().is_ok());
//! ```

mod newtypes;
mod version;

pub use newtypes::{ApiKey, ApiSecretKey, HostUrl, ShopDomain};
pub use version::ApiVersion;

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::AuthScopes;
use crate::error::ConfigError;

/// Human-readable app handle used in embedded admin URLs.
pub const APP_NAME: &str = "snapify";

/// Permission scopes requested on every installation.
pub const SCOPES: &str = "read_products,write_products,read_product_listings,write_product_listings";

/// Path Shopify redirects back to after consent.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Upper bound for the authorization-code exchange request.
pub const DEFAULT_TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// The confidential application identifier and secret.
///
/// An optional previous secret supports key rotation: callback signatures
/// made with the old secret keep validating while Shopify rolls over.
#[derive(Clone, Debug)]
pub struct AppCredentials {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    old_api_secret_key: Option<ApiSecretKey>,
}

impl AppCredentials {
    /// Creates credentials from a key and a secret.
    #[must_use]
    pub const fn new(api_key: ApiKey, api_secret_key: ApiSecretKey) -> Self {
        Self {
            api_key,
            api_secret_key,
            old_api_secret_key: None,
        }
    }

    /// Adds the previous secret accepted during key rotation.
    #[must_use]
    pub fn with_old_secret(mut self, old_api_secret_key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(old_api_secret_key);
        self
    }

    /// Returns the API key (OAuth `client_id`).
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the API secret key.
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the previous secret, if key rotation is in progress.
    #[must_use]
    pub const fn old_api_secret_key(&self) -> Option<&ApiSecretKey> {
        self.old_api_secret_key.as_ref()
    }
}

/// Service configuration.
///
/// Credentials are optional on purpose: a process without them still starts
/// and serves health checks, while the install routes answer with a
/// configuration error (see [`AppConfig::credentials`]).
#[derive(Clone, Debug)]
pub struct AppConfig {
    credentials: Option<AppCredentials>,
    host: HostUrl,
    scopes: AuthScopes,
    api_version: ApiVersion,
    token_exchange_timeout: Duration,
    bind_addr: SocketAddr,
    database_url: Option<String>,
}

impl AppConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Loads configuration from the process environment.
    ///
    /// See the crate documentation for the list of variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or a
    /// value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("APP_BASE_URL").ok_or(ConfigError::MissingEnvVar {
            name: "APP_BASE_URL",
        })?;

        let mut builder = Self::builder().host(HostUrl::new(host)?);

        if let Some(key) = var("SHOPIFY_API_KEY") {
            builder = builder.api_key(ApiKey::new(key)?);
        }
        if let Some(secret) = var("SHOPIFY_API_SECRET") {
            builder = builder.api_secret_key(ApiSecretKey::new(secret)?);
        }
        if let Some(old) = var("SHOPIFY_OLD_API_SECRET") {
            builder = builder.old_api_secret_key(ApiSecretKey::new(old)?);
        }
        if let Some(version) = var("SHOPIFY_API_VERSION") {
            builder = builder.api_version(version.parse()?);
        }
        if let Some(secs) = var("TOKEN_EXCHANGE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e| ConfigError::InvalidEnvVar {
                name: "TOKEN_EXCHANGE_TIMEOUT_SECS",
                reason: format!("{e}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidEnvVar {
                    name: "TOKEN_EXCHANGE_TIMEOUT_SECS",
                    reason: "must be greater than zero".to_string(),
                });
            }
            builder = builder.token_exchange_timeout(Duration::from_secs(secs));
        }
        if let Some(addr) = var("BIND_ADDR") {
            let addr = addr.trim().parse().map_err(|e| ConfigError::InvalidEnvVar {
                name: "BIND_ADDR",
                reason: format!("{e}"),
            })?;
            builder = builder.bind_addr(addr);
        }
        if let Some(url) = var("DATABASE_URL") {
            builder = builder.database_url(url.trim());
        }

        builder.build()
    }

    /// Returns the app credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredentials`] when either the API key or
    /// the API secret was not configured.
    pub fn credentials(&self) -> Result<&AppCredentials, ConfigError> {
        self.credentials
            .as_ref()
            .ok_or(ConfigError::MissingCredentials)
    }

    /// Returns the public base URL of this app.
    #[must_use]
    pub const fn host(&self) -> &HostUrl {
        &self.host
    }

    /// Returns the fixed OAuth callback URL.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        self.host.join(CALLBACK_PATH)
    }

    /// Returns the scopes requested during installation.
    #[must_use]
    pub const fn scopes(&self) -> &AuthScopes {
        &self.scopes
    }

    /// Returns the Admin API version.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns the timeout applied to the code exchange request.
    #[must_use]
    pub const fn token_exchange_timeout(&self) -> Duration {
        self.token_exchange_timeout
    }

    /// Returns the socket address the HTTP server binds to.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Returns the SQLite URL of the document store, if one is configured.
    ///
    /// Without it the service keeps its state in memory.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }
}

// Verify AppConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppConfig>();
};

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    old_api_secret_key: Option<ApiSecretKey>,
    host: Option<HostUrl>,
    scopes: Option<AuthScopes>,
    api_version: Option<ApiVersion>,
    token_exchange_timeout: Option<Duration>,
    bind_addr: Option<SocketAddr>,
    database_url: Option<String>,
}

impl AppConfigBuilder {
    /// Creates a new empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API secret key.
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the previous API secret key accepted during rotation.
    #[must_use]
    pub fn old_api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(key);
        self
    }

    /// Sets the public base URL (required).
    #[must_use]
    pub fn host(mut self, host: HostUrl) -> Self {
        self.host = Some(host);
        self
    }

    /// Overrides the requested scopes. Defaults to [`SCOPES`].
    #[must_use]
    pub fn scopes(mut self, scopes: AuthScopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Sets the Admin API version. Defaults to [`ApiVersion::latest`].
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Sets the code exchange timeout. Defaults to 10 seconds.
    #[must_use]
    pub const fn token_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.token_exchange_timeout = Some(timeout);
        self
    }

    /// Sets the bind address. Defaults to `0.0.0.0:8080`.
    #[must_use]
    pub const fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Sets the SQLite URL of the document store.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Builds the configuration.
    ///
    /// Credentials are only set when both the key and the secret were given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if no host was set.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let host = self
            .host
            .ok_or(ConfigError::MissingRequiredField { field: "host" })?;

        let credentials = match (self.api_key, self.api_secret_key) {
            (Some(key), Some(secret)) => {
                let credentials = AppCredentials::new(key, secret);
                Some(match self.old_api_secret_key {
                    Some(old) => credentials.with_old_secret(old),
                    None => credentials,
                })
            }
            _ => None,
        };

        let scopes = match self.scopes {
            Some(scopes) => scopes,
            None => SCOPES.parse()?,
        };

        let bind_addr = match self.bind_addr {
            Some(addr) => addr,
            None => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidEnvVar {
                    name: "BIND_ADDR",
                    reason: e.to_string(),
                })?,
        };

        Ok(AppConfig {
            credentials,
            host,
            scopes,
            api_version: self.api_version.unwrap_or_default(),
            token_exchange_timeout: self
                .token_exchange_timeout
                .unwrap_or(DEFAULT_TOKEN_EXCHANGE_TIMEOUT),
            bind_addr,
            database_url: self.database_url,
        })
    }
}
