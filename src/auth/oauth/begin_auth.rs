//! OAuth authorization URL generation.
//!
//! [`begin_auth`] is the first step of the authorization code flow. It
//! generates a fresh [`Nonce`] and the consent page URL carrying it as
//! `state`. Persisting the nonce is the caller's job.
//!
//! # Example
//!
//! ```rust
//! use snapify::{AppConfig, ApiKey, ApiSecretKey, HostUrl, ShopDomain};
//! use snapify::auth::oauth::begin_auth;
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("your-secret").unwrap())
//!     .host(HostUrl::new("https://your-app.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let shop = ShopDomain::new("example-shop").unwrap();
//! let result = begin_auth(&config, &shop).unwrap();
//!
//! assert!(result.auth_url.starts_with("https://example-shop.myshopify.com/admin/oauth/authorize?"));
//! assert!(result.auth_url.ends_with(&format!("state={}", result.nonce)));
//! ```

use crate::auth::oauth::error::OAuthError;
use crate::auth::oauth::nonce::Nonce;
use crate::config::{AppConfig, ShopDomain};

/// Result of [`begin_auth`].
#[derive(Clone, Debug)]
pub struct BeginAuthResult {
    /// The consent page URL the merchant is redirected to.
    pub auth_url: String,

    /// The nonce sent as `state`; it must be stored on the shop record.
    pub nonce: Nonce,
}

/// Builds the authorization URL for an offline access token.
///
/// The URL has the form
/// `https://{shop}/admin/oauth/authorize?client_id=…&scope=…&redirect_uri=…&state=…`
/// where `redirect_uri` is [`AppConfig::redirect_uri`].
///
/// # Errors
///
/// Returns [`OAuthError::Config`] when the app credentials are missing.
pub fn begin_auth(config: &AppConfig, shop: &ShopDomain) -> Result<BeginAuthResult, OAuthError> {
    let credentials = config.credentials()?;
    let nonce = Nonce::generate();

    let params = [
        ("client_id", credentials.api_key().as_ref().to_string()),
        ("scope", config.scopes().to_string()),
        ("redirect_uri", config.redirect_uri()),
        ("state", nonce.to_string()),
    ];

    let query_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let auth_url = format!(
        "https://{}/admin/oauth/authorize?{}",
        shop.as_ref(),
        query_string
    );

    Ok(BeginAuthResult { auth_url, nonce })
}

// Verify BeginAuthResult is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<BeginAuthResult>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey, HostUrl};
    use crate::error::ConfigError;

    fn create_test_config() -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new("test-api-key").unwrap())
            .api_secret_key(ApiSecretKey::new("test-secret").unwrap())
            .host(HostUrl::new("https://myapp.example.com").unwrap())
            .build()
            .unwrap()
    }

    fn create_test_shop() -> ShopDomain {
        ShopDomain::new("test-shop").unwrap()
    }

    fn query_of(url: &str) -> Vec<(String, String)> {
        let (_, query) = url.split_once('?').unwrap();
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn test_begin_auth_generates_correct_url_structure() {
        let result = begin_auth(&create_test_config(), &create_test_shop()).unwrap();

        assert!(result
            .auth_url
            .starts_with("https://test-shop.myshopify.com/admin/oauth/authorize?"));
    }

    #[test]
    fn test_begin_auth_includes_params_in_order() {
        let result = begin_auth(&create_test_config(), &create_test_shop()).unwrap();
        let params = query_of(&result.auth_url);

        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["client_id", "scope", "redirect_uri", "state"]);
        assert_eq!(params[0].1, "test-api-key");
        assert_eq!(
            params[1].1,
            "read_product_listings,read_products,write_product_listings,write_products"
        );
        assert_eq!(params[2].1, "https://myapp.example.com/auth/callback");
        assert_eq!(params[3].1, result.nonce.as_ref());
    }

    #[test]
    fn test_begin_auth_url_encodes_redirect_uri() {
        let result = begin_auth(&create_test_config(), &create_test_shop()).unwrap();
        assert!(result
            .auth_url
            .contains("redirect_uri=https%3A%2F%2Fmyapp.example.com%2Fauth%2Fcallback"));
        assert!(result.auth_url.contains("scope=read_product_listings%2Cread_products"));
    }

    #[test]
    fn test_begin_auth_generates_fresh_nonce_each_call() {
        let config = create_test_config();
        let shop = create_test_shop();

        let first = begin_auth(&config, &shop).unwrap();
        let second = begin_auth(&config, &shop).unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.auth_url, second.auth_url);
    }

    #[test]
    fn test_begin_auth_requires_credentials() {
        let config = AppConfig::builder()
            .host(HostUrl::new("https://myapp.example.com").unwrap())
            .build()
            .unwrap();

        let result = begin_auth(&config, &create_test_shop());
        assert!(matches!(
            result,
            Err(OAuthError::Config(ConfigError::MissingCredentials))
        ));
    }
}
