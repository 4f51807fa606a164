//! Install flow errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::oauth::OAuthError;
use crate::error::ConfigError;
use crate::store::StoreError;

/// Errors returned by [`crate::install::Installer`].
///
/// [`InstallError::status`] and [`InstallError::public_message`] give the
/// HTTP answer; the `Display` output is for logs only.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A required query parameter is missing or empty.
    #[error("Missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// A query parameter is present but unusable.
    #[error("Invalid parameter '{0}'")]
    InvalidParameter(&'static str),

    /// The `shop` parameter is not a valid shop domain.
    #[error("Invalid shop domain: {0}")]
    InvalidShop(#[source] ConfigError),

    /// App credentials are not configured.
    #[error("App is not configured: {0}")]
    Configuration(#[source] ConfigError),

    /// The callback signature did not verify.
    #[error("Callback HMAC validation failed")]
    InvalidHmac,

    /// The callback `state` did not match the pending nonce.
    #[error("Callback state does not match the pending nonce")]
    StateMismatch,

    /// The authorization code exchange failed.
    #[error("Token exchange failed: {0}")]
    TokenExchange(#[source] OAuthError),

    /// The shop record could not be read or written.
    #[error("Shop record storage failed: {0}")]
    Store(#[from] StoreError),
}

impl InstallError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_)
            | Self::InvalidParameter(_)
            | Self::InvalidShop(_)
            | Self::InvalidHmac => StatusCode::BAD_REQUEST,
            Self::StateMismatch => StatusCode::FORBIDDEN,
            Self::Configuration(_) | Self::TokenExchange(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Generic message safe to show to the merchant.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "Missing required parameter.",
            Self::InvalidParameter(_) => "Invalid parameter.",
            Self::InvalidShop(_) => "Invalid shop domain.",
            Self::Configuration(_) => "Server configuration error: App credentials missing.",
            Self::InvalidHmac => "HMAC validation failed.",
            Self::StateMismatch => "Invalid state parameter.",
            Self::TokenExchange(_) => "An error occurred during the final step of installation.",
            Self::Store(_) => "Internal server error.",
        }
    }
}

impl From<OAuthError> for InstallError {
    fn from(error: OAuthError) -> Self {
        match error {
            OAuthError::Config(e) => Self::Configuration(e),
            OAuthError::InvalidHmac => Self::InvalidHmac,
            OAuthError::StateMismatch => Self::StateMismatch,
            other => Self::TokenExchange(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            InstallError::MissingParameter("shop").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InstallError::InvalidParameter("host").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(InstallError::InvalidHmac.status(), StatusCode::BAD_REQUEST);
        assert_eq!(InstallError::StateMismatch.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            InstallError::Configuration(ConfigError::MissingCredentials).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            InstallError::Store(StoreError::Backend("down".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_oauth_error() {
        let error: InstallError = OAuthError::Config(ConfigError::MissingCredentials).into();
        assert!(matches!(error, InstallError::Configuration(_)));

        let error: InstallError = OAuthError::TokenExchangeFailed {
            status: 400,
            message: "bad code".to_string(),
        }
        .into();
        assert!(matches!(error, InstallError::TokenExchange(_)));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_public_message_hides_detail() {
        let error = InstallError::TokenExchange(OAuthError::TokenExchangeFailed {
            status: 400,
            message: "secret upstream body".to_string(),
        });
        assert!(!error.public_message().contains("secret upstream body"));
        assert!(error.to_string().contains("secret upstream body"));
    }
}
