//! Single-use anti-forgery tokens for the OAuth `state` parameter.
//!
//! A [`Nonce`] is generated when an installation begins, persisted on the
//! shop record, sent to Shopify as `state`, and must come back unchanged on
//! the callback. It is cleared as soon as one callback consumes it.

use rand::RngCore;
use std::fmt;

use crate::auth::oauth::hmac::constant_time_compare;

/// A cryptographically random, hex-encoded nonce.
///
/// # Example
///
/// ```rust
/// use snapify::auth::oauth::Nonce;
///
/// let nonce = Nonce::generate();
/// assert_eq!(nonce.as_ref().len(), 64);
/// assert!(nonce.matches(nonce.as_ref()));
/// assert!(!nonce.matches("forged"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Number of random bytes behind each nonce.
    pub const ENTROPY_BYTES: usize = 32;

    /// Generates a new nonce from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wraps a nonce read back from storage.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Compares against a received `state` value in constant time.
    #[must_use]
    pub fn matches(&self, received: &str) -> bool {
        constant_time_compare(&self.0, received)
    }
}

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Nonce").field(&self.0).finish()
    }
}

// Verify Nonce is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Nonce>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_hex_of_full_entropy() {
        let nonce = Nonce::generate();
        assert_eq!(nonce.as_ref().len(), Nonce::ENTROPY_BYTES * 2);
        assert!(nonce.as_ref().chars().all(|c| c.is_ascii_hexdigit()));

        let decoded = hex::decode(nonce.as_ref()).unwrap();
        assert!(decoded.len() >= 16);
    }

    #[test]
    fn test_generate_produces_unique_nonces() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn test_matches_is_exact() {
        let nonce = Nonce::from_raw("n1");
        assert!(nonce.matches("n1"));
        assert!(!nonce.matches("n2"));
        assert!(!nonce.matches("n1 "));
        assert!(!nonce.matches(""));
    }

    #[test]
    fn test_display_and_as_ref_agree() {
        let nonce = Nonce::generate();
        assert_eq!(nonce.to_string(), nonce.as_ref());
    }
}
