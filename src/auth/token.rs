//! Access credentials issued by the token endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A long-lived Admin API access token.
///
/// Serializes transparently so it can be persisted on the shop record, but
/// `Debug` never prints the value.
///
/// ```rust
/// use snapify::auth::AccessToken;
///
/// let token = AccessToken::new("shpat_123");
/// assert_eq!(token.as_ref(), "shpat_123");
/// assert_eq!(format!("{token:?}"), "AccessToken(*****)");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns `true` for an empty token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(*****)")
    }
}

/// Body returned by `POST /admin/oauth/access_token` for offline tokens.
#[derive(Clone, Debug, Deserialize)]
pub struct AccessTokenResponse {
    /// The issued access token.
    pub access_token: AccessToken,
    /// Comma-separated scopes actually granted.
    #[serde(default)]
    pub scope: String,
}
