//! Raw query parameters of an OAuth callback.
//!
//! Shopify signs every parameter it sends, including ones this app does not
//! know about, so the callback query is kept as the full ordered list of
//! pairs rather than a fixed struct. Typed accessors pull out the fields the
//! handshake needs.

use url::form_urlencoded;

/// Parameters excluded from the signed message.
const UNSIGNED_PARAMS: [&str; 2] = ["hmac", "signature"];

/// The query string of a callback request, as received.
///
/// # Example
///
/// ```rust
/// use snapify::auth::oauth::CallbackQuery;
///
/// let query = CallbackQuery::from_pairs(vec![
///     ("shop".to_string(), "foo.myshopify.com".to_string()),
///     ("code".to_string(), "abc".to_string()),
///     ("hmac".to_string(), "deadbeef".to_string()),
/// ]);
///
/// assert_eq!(query.code(), Some("abc"));
/// assert_eq!(query.signable_string(), "code=abc&shop=foo.myshopify.com");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pairs: Vec<(String, String)>,
}

impl CallbackQuery {
    /// Wraps decoded `(key, value)` pairs in request order.
    #[must_use]
    pub const fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Parses a raw, percent-encoded query string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::from_pairs(form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
    }

    /// Returns the first non-empty value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Returns the `shop` parameter.
    #[must_use]
    pub fn shop(&self) -> Option<&str> {
        self.get("shop")
    }

    /// Returns the authorization `code`.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.get("code")
    }

    /// Returns the `state` parameter (the nonce echoed back).
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.get("state")
    }

    /// Returns the `hmac` signature.
    #[must_use]
    pub fn hmac(&self) -> Option<&str> {
        self.get("hmac")
    }

    /// Returns the base64 encoded admin `host`.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }

    /// Builds the message Shopify signed.
    ///
    /// Every pair except `hmac` and `signature` is kept, sorted by key
    /// (ties keep request order) and re-encoded with
    /// `application/x-www-form-urlencoded` rules.
    #[must_use]
    pub fn signable_string(&self) -> String {
        let mut signed: Vec<&(String, String)> = self
            .pairs
            .iter()
            .filter(|(k, _)| !UNSIGNED_PARAMS.contains(&k.as_str()))
            .collect();
        signed.sort_by(|a, b| a.0.cmp(&b.0));

        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(signed.into_iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

impl From<Vec<(String, String)>> for CallbackQuery {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::from_pairs(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> CallbackQuery {
        CallbackQuery::from_pairs(
            items
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_signable_string_sorts_and_drops_signatures() {
        let query = pairs(&[
            ("state", "n1"),
            ("shop", "foo.myshopify.com"),
            ("hmac", "abc"),
            ("signature", "legacy"),
            ("code", "c"),
            ("timestamp", "1700000000"),
        ]);

        assert_eq!(
            query.signable_string(),
            "code=c&shop=foo.myshopify.com&state=n1&timestamp=1700000000"
        );
    }

    #[test]
    fn test_signable_string_reencodes_values() {
        let query = pairs(&[("host", "YWRtaW4=/x y"), ("a", "1&2")]);
        assert_eq!(query.signable_string(), "a=1%262&host=YWRtaW4%3D%2Fx+y");
    }

    #[test]
    fn test_signable_string_keeps_unknown_params() {
        let query = pairs(&[("zeta", "1"), ("code", "c"), ("hmac", "h")]);
        assert_eq!(query.signable_string(), "code=c&zeta=1");
    }

    #[test]
    fn test_signable_string_is_stable_for_duplicate_keys() {
        let query = pairs(&[("b", "2"), ("a", "second"), ("a", "first")]);
        assert_eq!(query.signable_string(), "a=second&a=first&b=2");
    }

    #[test]
    fn test_parse_decodes_raw_query() {
        let query = CallbackQuery::parse("shop=foo.myshopify.com&host=YWRtaW4%3D&code=a+b");
        assert_eq!(query.shop(), Some("foo.myshopify.com"));
        assert_eq!(query.host(), Some("YWRtaW4="));
        assert_eq!(query.code(), Some("a b"));
    }

    #[test]
    fn test_get_treats_empty_values_as_missing() {
        let query = pairs(&[("code", ""), ("state", "n1")]);
        assert_eq!(query.code(), None);
        assert_eq!(query.state(), Some("n1"));
        assert_eq!(query.hmac(), None);
    }
}
