//! Authentication types.
//!
//! - [`AuthScopes`]: OAuth scopes with implied scope handling
//! - [`AccessToken`] / [`AccessTokenResponse`]: credentials returned by the
//!   token endpoint
//! - [`oauth`]: the authorization code handshake primitives (nonce, HMAC,
//!   authorization URL, code exchange)

pub mod oauth;
mod scopes;
mod token;

pub use scopes::AuthScopes;
pub use token::{AccessToken, AccessTokenResponse};
