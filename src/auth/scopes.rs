//! OAuth scope handling.
//!
//! [`AuthScopes`] parses the comma-separated scope strings Shopify uses and
//! adds implied scopes (`write_x` implies `read_x`), so that the scopes
//! granted by the token endpoint can be compared with the requested ones.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A set of OAuth access scopes.
///
/// Display output is sorted and comma-joined, so the `scope` parameter of an
/// authorization URL is deterministic for a given set.
///
/// # Example
///
/// ```rust
/// use snapify::AuthScopes;
///
/// let scopes: AuthScopes = "write_products,read_product_listings".parse().unwrap();
/// assert_eq!(scopes.to_string(), "read_product_listings,read_products,write_products");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AuthScopes {
    scopes: BTreeSet<String>,
}

impl AuthScopes {
    /// Creates an empty scope set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no scopes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns `true` if every scope in `other` is also in `self`.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other.scopes.is_subset(&self.scopes)
    }

    /// Iterates the scopes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    fn add_implied_scopes(&mut self) {
        let implied: Vec<String> = self
            .scopes
            .iter()
            .filter_map(|scope| Self::implied_scope(scope))
            .collect();

        self.scopes.extend(implied);
    }

    fn implied_scope(scope: &str) -> Option<String> {
        scope
            .strip_prefix("unauthenticated_write_")
            .map(|rest| format!("unauthenticated_read_{rest}"))
            .or_else(|| {
                scope
                    .strip_prefix("write_")
                    .map(|rest| format!("read_{rest}"))
            })
    }
}

impl FromStr for AuthScopes {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut scopes = BTreeSet::new();

        for scope in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !scope.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::InvalidScopes {
                    reason: format!("Invalid characters in scope: '{scope}'"),
                });
            }
            scopes.insert(scope.to_string());
        }

        let mut auth_scopes = Self { scopes };
        auth_scopes.add_implied_scopes();

        Ok(auth_scopes)
    }
}

impl fmt::Display for AuthScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.iter().collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

impl Serialize for AuthScopes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AuthScopes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCOPES;

    #[test]
    fn test_auth_scopes_parses_comma_separated() {
        let scopes: AuthScopes = "read_products, read_product_listings".parse().unwrap();
        assert!(scopes.iter().any(|s| s == "read_products"));
        assert!(scopes.iter().any(|s| s == "read_product_listings"));
    }

    #[test]
    fn test_auth_scopes_handles_implied_scopes() {
        let scopes: AuthScopes = "write_products".parse().unwrap();
        assert!(scopes.iter().any(|s| s == "write_products"));
        assert!(scopes.iter().any(|s| s == "read_products"));

        let scopes: AuthScopes = "unauthenticated_write_checkouts".parse().unwrap();
        assert!(scopes.iter().any(|s| s == "unauthenticated_read_checkouts"));
    }

    #[test]
    fn test_auth_scopes_rejects_invalid_characters() {
        let result: Result<AuthScopes, _> = "read_products,write products".parse();
        assert!(matches!(result, Err(ConfigError::InvalidScopes { .. })));
    }

    #[test]
    fn test_install_scopes_render_deterministically() {
        let first: AuthScopes = SCOPES.parse().unwrap();
        let second: AuthScopes = SCOPES.parse().unwrap();
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(
            first.to_string(),
            "read_product_listings,read_products,write_product_listings,write_products"
        );
    }

    #[test]
    fn test_auth_scopes_covers() {
        let granted: AuthScopes = "write_products,read_product_listings".parse().unwrap();
        let required: AuthScopes = "read_products".parse().unwrap();
        assert!(granted.covers(&required));

        let requested: AuthScopes = SCOPES.parse().unwrap();
        assert!(!granted.covers(&requested));
        assert!(requested.covers(&granted));
    }

    #[test]
    fn test_empty_auth_scopes() {
        assert!(AuthScopes::new().is_empty());
        let scopes: AuthScopes = " , ".parse().unwrap();
        assert!(scopes.is_empty());
        assert_eq!(serde_json::to_string(&scopes).unwrap(), r#""""#);
    }

    #[test]
    fn test_auth_scopes_serde_as_string() {
        let scopes: AuthScopes = serde_json::from_str(r#""write_products""#).unwrap();
        let json = serde_json::to_string(&scopes).unwrap();
        assert_eq!(json, r#""read_products,write_products""#);
    }
}
