//! OAuth-specific error types.
//!
//! # Error Types
//!
//! - [`OAuthError::InvalidHmac`]: HMAC signature validation failed
//! - [`OAuthError::StateMismatch`]: callback `state` does not match the stored nonce
//! - [`OAuthError::TokenExchangeFailed`]: the code exchange returned an error
//! - [`OAuthError::TokenExchangeTimeout`]: the code exchange did not answer in time
//! - [`OAuthError::InvalidCallback`]: callback parameters are malformed
//! - [`OAuthError::Config`]: credentials or other configuration are missing
//!
//! # Example
//!
//! ```rust
//! use snapify::auth::oauth::OAuthError;
//!
//! let error = OAuthError::InvalidHmac;
//! assert_eq!(error.to_string(), "HMAC signature validation failed");
//! ```

use std::time::Duration;

use crate::error::ConfigError;
use thiserror::Error;

/// Errors that can occur during the OAuth handshake.
///
/// Messages never include secrets, nonces or authorization codes.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// HMAC signature validation failed.
    ///
    /// The callback was not signed with the app secret (or the old secret
    /// during rotation), or one of its parameters was altered.
    #[error("HMAC signature validation failed")]
    InvalidHmac,

    /// The callback `state` does not match the pending nonce, or the nonce
    /// was already consumed.
    #[error("State parameter does not match the pending nonce")]
    StateMismatch,

    /// Token exchange request failed.
    ///
    /// `status` is `0` when no HTTP response was received.
    #[error("Token exchange failed with status {status}: {message}")]
    TokenExchangeFailed {
        /// The HTTP status code returned.
        status: u16,
        /// The error message from the response.
        message: String,
    },

    /// The token endpoint did not answer within the configured timeout.
    #[error("Token exchange timed out after {}s", .0.as_secs())]
    TokenExchangeTimeout(Duration),

    /// Callback parameters are invalid or malformed.
    #[error("Invalid callback: {reason}")]
    InvalidCallback {
        /// Description of what's invalid about the callback.
        reason: String,
    },

    /// The app is not configured for OAuth.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// Verify OAuthError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<OAuthError>();
};
