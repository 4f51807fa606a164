//! OAuth 2.0 authorization code grant for Shopify apps.
//!
//! The installation handshake has two halves:
//!
//! 1. **Authorization initiation** ([`begin_auth`]): generate a [`Nonce`] and
//!    the consent page URL that carries it as `state`.
//! 2. **Callback verification**: the [`CallbackQuery`] Shopify redirects back
//!    with is checked with [`validate_hmac`], its `state` is matched against
//!    the stored nonce, and the `code` is exchanged for an offline token by a
//!    [`TokenExchanger`].
//!
//! Sequencing the two halves with persistence lives in
//! [`crate::install::Installer`].
//!
//! # Security Features
//!
//! - **HMAC Validation**: callbacks are verified with HMAC-SHA256
//! - **CSRF Protection**: the single-use nonce binds a callback to one initiation
//! - **Constant-Time Comparison** for both the HMAC and the nonce
//! - **Key Rotation Support**: an old API secret keeps validating while
//!   Shopify rolls over to the new one

mod begin_auth;
mod callback_query;
mod error;
pub mod hmac;
mod nonce;
mod token_exchange;

pub use begin_auth::{begin_auth, BeginAuthResult};
pub use callback_query::CallbackQuery;
pub use error::OAuthError;
pub use self::hmac::validate_hmac;
pub use nonce::Nonce;
pub use token_exchange::{ShopifyTokenExchanger, TokenExchanger};
