//! Product mirror errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::clients::graphql::GraphqlError;
use crate::error::ConfigError;
use crate::store::StoreError;

/// Errors returned by [`crate::products::ProductSync`].
#[derive(Debug, Error)]
pub enum ProductError {
    /// The request did not name a shop.
    #[error("Missing required parameter 'shop'")]
    MissingShop,

    /// The `shop` value is not a valid shop domain.
    #[error("Invalid shop domain: {0}")]
    InvalidShop(#[source] ConfigError),

    /// The shop has no record or no active access token.
    #[error("Shop is not installed or has no access token")]
    NotInstalled,

    /// The Admin API call failed.
    #[error(transparent)]
    Graphql(#[from] GraphqlError),

    /// The Admin API answered with an unexpected shape.
    #[error("Unexpected products response: {reason}")]
    MalformedResponse {
        /// What was wrong.
        reason: String,
    },

    /// The query stayed throttled.
    #[error("Products query still throttled after {attempts} attempts")]
    Throttled {
        /// Throttled answers received for one page.
        attempts: u32,
    },

    /// Reading or writing the mirror failed.
    #[error("Product storage failed: {0}")]
    Store(#[from] StoreError),
}

impl ProductError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingShop | Self::InvalidShop(_) => StatusCode::BAD_REQUEST,
            Self::NotInstalled => StatusCode::UNAUTHORIZED,
            Self::Graphql(_)
            | Self::MalformedResponse { .. }
            | Self::Throttled { .. }
            | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic message safe to return to the browser.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MissingShop => "Missing shop parameter.",
            Self::InvalidShop(_) => "Invalid shop domain.",
            Self::NotInstalled => "Authentication required.",
            Self::Graphql(_) | Self::MalformedResponse { .. } | Self::Throttled { .. } => {
                "Failed to sync products."
            }
            Self::Store(_) => "Internal server error.",
        }
    }
}
