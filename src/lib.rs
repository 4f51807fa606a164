//! # snapify
//!
//! Backend of an embedded Shopify app: the OAuth installation handshake and
//! a mirror of the shop's product catalog.
//!
//! ## Overview
//!
//! - Validated configuration via [`AppConfig`] and its builder
//! - OAuth primitives in [`auth::oauth`]: consent URL, nonce, callback HMAC,
//!   authorization-code exchange
//! - The install flow in [`install::Installer`]: start, verify, exchange,
//!   persist, redirect into the Shopify admin
//! - Per-shop records and a pluggable document store in [`store`]
//! - Durable diagnostic events in [`diagnostics`]
//! - An Admin GraphQL client with retry and cost-based pacing in [`clients`]
//! - The product mirror in [`products`]
//! - The axum routes in [`server`]
//!
//! ## Installation handshake
//!
//! ```rust
//! use snapify::{AppConfig, ApiKey, ApiSecretKey, HostUrl, ShopDomain};
//! use snapify::auth::oauth::begin_auth;
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("s3cr3t").unwrap())
//!     .host(HostUrl::new("https://app.example.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let shop = ShopDomain::new("foo").unwrap();
//! let result = begin_auth(&config, &shop).unwrap();
//!
//! assert!(result.auth_url.starts_with("https://foo.myshopify.com/admin/oauth/authorize?"));
//! assert!(result.auth_url.contains(&format!("state={}", result.nonce)));
//! ```
//!
//! The callback is verified against the app secret before anything else:
//!
//! ```rust
//! use snapify::auth::oauth::{hmac, CallbackQuery};
//!
//! let signature = hmac::compute_signature("code=abc&shop=foo.myshopify.com&state=n1", "s3cr3t");
//! let query = CallbackQuery::parse(&format!(
//!     "shop=foo.myshopify.com&code=abc&state=n1&hmac={signature}"
//! ));
//!
//! assert_eq!(query.signable_string(), "code=abc&shop=foo.myshopify.com&state=n1");
//! ```
//!
//! ## Environment
//!
//! | variable                      | required | default        |
//! |-------------------------------|----------|----------------|
//! | `APP_BASE_URL`                | yes      |                |
//! | `SHOPIFY_API_KEY`             | no       |                |
//! | `SHOPIFY_API_SECRET`          | no       |                |
//! | `SHOPIFY_OLD_API_SECRET`      | no       |                |
//! | `SHOPIFY_API_VERSION`         | no       | latest known   |
//! | `TOKEN_EXCHANGE_TIMEOUT_SECS` | no       | 10             |
//! | `BIND_ADDR`                   | no       | `0.0.0.0:8080` |
//! | `DATABASE_URL`                | no       | in-memory store |
//!
//! Missing credentials do not stop the process; the install routes answer
//! with a server error until they are set.

#![warn(missing_docs)]

pub mod auth;
pub mod clients;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod install;
pub mod products;
pub mod server;
pub mod store;

pub use auth::AuthScopes;
pub use config::{
    ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppConfigBuilder, AppCredentials, HostUrl,
    ShopDomain,
};
pub use error::ConfigError;
