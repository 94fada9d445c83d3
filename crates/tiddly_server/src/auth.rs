//! Identity resolution for incoming requests.
//!
//! The server does not check credentials. It sits behind an authenticating
//! reverse proxy which puts the signed-in user's id in a trusted header. Any
//! non-empty value counts as an administrator.
//!
//! ## Proxy setup
//!
//! Configure the proxy to strip the header from client requests and set it
//! from its session, e.g. `X-Webauth-User: {{.Session.Values.user}}`.

use axum::http::{HeaderMap, HeaderName};

/// Default trusted header.
pub const DEFAULT_AUTH_HEADER: &str = "X-Webauth-User";

/// Name reported when no identity is present.
pub const GUEST: &str = "GUEST";

/// Resolves the current user of a request.
pub trait IdentityResolver: Send + Sync {
    /// Returns the user id, or `None` for an anonymous request.
    fn current_user(&self, headers: &HeaderMap) -> Option<String>;
}

/// Reads the user id from a header set by a trusted proxy.
#[derive(Debug, Clone)]
pub struct TrustedHeader {
    header: HeaderName,
}

impl TrustedHeader {
    /// Creates a resolver for the given header.
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    /// Returns the header this resolver reads.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for TrustedHeader {
    fn default() -> Self {
        Self::new(HeaderName::from_static("x-webauth-user"))
    }
}

impl IdentityResolver for TrustedHeader {
    fn current_user(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }
}

/// Resolves every request to the same identity.
///
/// Useful for tests and for local runs without a proxy.
#[derive(Debug, Clone, Default)]
pub struct FixedIdentity {
    user: Option<String>,
}

impl FixedIdentity {
    /// Every request is `user`.
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }

    /// Every request is anonymous.
    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl IdentityResolver for FixedIdentity {
    fn current_user(&self, _headers: &HeaderMap) -> Option<String> {
        self.user.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn trusted_header_reads_user() {
        let mut headers = HeaderMap::new();
        headers.insert("x-webauth-user", HeaderValue::from_static("alice"));
        assert_eq!(
            TrustedHeader::default().current_user(&headers),
            Some("alice".to_string())
        );
    }

    #[test]
    fn trusted_header_name_is_case_insensitive() {
        let resolver = TrustedHeader::new(HeaderName::from_bytes(b"X-Remote-User").unwrap());
        let mut headers = HeaderMap::new();
        headers.insert("x-remote-user", HeaderValue::from_static("bob"));
        assert_eq!(resolver.current_user(&headers), Some("bob".to_string()));
    }

    #[test]
    fn missing_or_empty_header_is_anonymous() {
        let resolver = TrustedHeader::default();
        assert_eq!(resolver.current_user(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert("x-webauth-user", HeaderValue::from_static(""));
        assert_eq!(resolver.current_user(&headers), None);
    }

    #[test]
    fn other_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-user", HeaderValue::from_static("mallory"));
        assert_eq!(TrustedHeader::default().current_user(&headers), None);
    }

    #[test]
    fn fixed_identity() {
        let headers = HeaderMap::new();
        assert_eq!(
            FixedIdentity::user("admin").current_user(&headers),
            Some("admin".to_string())
        );
        assert_eq!(FixedIdentity::anonymous().current_user(&headers), None);
    }
}
