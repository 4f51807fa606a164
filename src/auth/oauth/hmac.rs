//! HMAC validation for Shopify OAuth callbacks.
//!
//! Shopify signs the callback query with HMAC-SHA256 keyed by the app
//! secret and sends the lowercase hex digest as the `hmac` parameter.
//!
//! # Security
//!
//! All comparisons run in constant time. Validation falls back to the old
//! secret key when one is configured, so callbacks signed before a key
//! rotation keep verifying.
//!
//! # Example
//!
//! ```rust
//! use snapify::auth::oauth::hmac::{compute_signature, constant_time_compare};
//!
//! let message = "code=abc123&shop=example.myshopify.com&state=xyz";
//! let signature = compute_signature(message, "my-api-secret");
//! assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
//! assert!(constant_time_compare(&signature, &compute_signature(message, "my-api-secret")));
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::oauth::CallbackQuery;
use crate::config::AppCredentials;

type HmacSha256 = Hmac<Sha256>;

/// Computes an HMAC-SHA256 signature for the given message.
///
/// The signature is returned as a lowercase hexadecimal string.
///
/// ```rust
/// use snapify::auth::oauth::hmac::compute_signature;
///
/// let sig = compute_signature("test-message", "secret-key");
/// assert_eq!(sig.len(), 64);
/// ```
#[must_use]
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
pub fn compute_signature(message: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Performs constant-time comparison of two strings.
///
/// Strings of different lengths compare unequal.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Validates the `hmac` parameter of a callback query.
///
/// The primary secret is tried first, then the old secret if one is
/// configured. A query without an `hmac` parameter never validates.
#[must_use]
pub fn validate_hmac(query: &CallbackQuery, credentials: &AppCredentials) -> bool {
    let Some(received_hmac) = query.hmac() else {
        return false;
    };
    let signable = query.signable_string();

    let computed = compute_signature(&signable, credentials.api_secret_key().as_ref());
    if constant_time_compare(&computed, received_hmac) {
        return true;
    }

    if let Some(old_secret) = credentials.old_api_secret_key() {
        let computed_old = compute_signature(&signable, old_secret.as_ref());
        if constant_time_compare(&computed_old, received_hmac) {
            return true;
        }
    }

    false
}
