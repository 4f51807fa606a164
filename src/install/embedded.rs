//! Redirect target inside the Shopify admin.
//!
//! Shopify passes the admin context as `host`, a base64 encoding of either
//! `admin.shopify.com/store/{name}` or the legacy `{name}.myshopify.com/admin`.
//! The app page lives under `/apps/{APP_NAME}` of that context. A `host`
//! that does not decode to one of those forms is ignored so the callback
//! can never redirect off Shopify.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::config::{ShopDomain, APP_NAME};

const UNIFIED_ADMIN_PREFIX: &str = "admin.shopify.com/store/";
const LEGACY_ADMIN_SUFFIX: &str = ".myshopify.com/admin";

/// Builds the URL of the embedded app page for `shop`.
///
/// ```rust
/// use snapify::ShopDomain;
/// use snapify::install::embedded_app_url;
///
/// let shop = ShopDomain::new("foo").unwrap();
/// // base64("admin.shopify.com/store/foo")
/// let url = embedded_app_url(&shop, Some("YWRtaW4uc2hvcGlmeS5jb20vc3RvcmUvZm9v"));
/// assert_eq!(url, "https://admin.shopify.com/store/foo/apps/snapify");
///
/// assert_eq!(
///     embedded_app_url(&shop, None),
///     "https://foo.myshopify.com/admin/apps/snapify"
/// );
/// ```
#[must_use]
pub fn embedded_app_url(shop: &ShopDomain, host: Option<&str>) -> String {
    match host.and_then(decode_admin_host) {
        Some(admin) => format!("https://{admin}/apps/{APP_NAME}"),
        None => format!("https://{}/admin/apps/{APP_NAME}", shop.as_ref()),
    }
}

/// Decodes `host` and returns it if it names a Shopify admin.
fn decode_admin_host(host: &str) -> Option<String> {
    let host = host.trim();
    let bytes = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(host).ok())?;
    let decoded = String::from_utf8(bytes).ok()?;
    let decoded = decoded.trim_end_matches('/');

    is_admin_host(decoded).then(|| decoded.to_string())
}

fn is_admin_host(decoded: &str) -> bool {
    if let Some(store) = decoded.strip_prefix(UNIFIED_ADMIN_PREFIX) {
        return is_store_name(store);
    }
    if let Some(name) = decoded.strip_suffix(LEGACY_ADMIN_SUFFIX) {
        return is_store_name(name);
    }
    false
}

fn is_store_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
