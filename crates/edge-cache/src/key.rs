//! Request identity used as the cache key.

use edge_core::InterceptedRequest;
use http::Method;
use url::Url;

/// Identity of a cached response: request method plus URL.
///
/// The URL fragment is not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    url: String,
}

impl RequestKey {
    /// Create a key from a method and URL.
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }

    /// Key for an intercepted request.
    pub fn for_request(request: &InterceptedRequest) -> Self {
        Self::new(request.method().clone(), request.url())
    }

    /// Key for a GET of `url`.
    pub fn get(url: &Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL without fragment.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_key_ignores_fragment() {
        assert_eq!(
            RequestKey::get(&url("https://host.test/page#top")),
            RequestKey::get(&url("https://host.test/page"))
        );
    }

    #[test]
    fn test_key_includes_query() {
        assert_ne!(
            RequestKey::get(&url("https://host.test/page?a=1")),
            RequestKey::get(&url("https://host.test/page?a=2"))
        );
    }

    #[test]
    fn test_key_includes_method() {
        let u = url("https://host.test/page");
        assert_ne!(RequestKey::new(Method::GET, &u), RequestKey::new(Method::HEAD, &u));
    }

    #[test]
    fn test_key_for_request() {
        let req = InterceptedRequest::parse(Method::GET, "https://host.test/a.js#x").unwrap();
        let key = RequestKey::for_request(&req);
        assert_eq!(key.url(), "https://host.test/a.js");
        assert_eq!(key.to_string(), "GET https://host.test/a.js");
    }
}
