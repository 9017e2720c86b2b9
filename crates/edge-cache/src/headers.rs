//! Cross-origin isolation headers.

use edge_core::Response;
use http::header::{HeaderName, HeaderValue};

/// Header names and values injected for cross-origin isolation.
pub mod header_names {
    /// Embedder policy header.
    pub const CROSS_ORIGIN_EMBEDDER_POLICY: &str = "cross-origin-embedder-policy";
    /// Opener policy header.
    pub const CROSS_ORIGIN_OPENER_POLICY: &str = "cross-origin-opener-policy";
    /// Embedder policy value.
    pub const REQUIRE_CORP: &str = "require-corp";
    /// Opener policy value.
    pub const SAME_ORIGIN: &str = "same-origin";
}

/// Default URL suffix of the module that needs isolation headers.
pub const DEFAULT_ISOLATION_SUFFIX: &str = "widget.mjs";

/// Injects cross-origin isolation headers into responses whose URL ends with
/// a configured suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationHeaders {
    suffix: String,
}

impl Default for IsolationHeaders {
    fn default() -> Self {
        Self::new(DEFAULT_ISOLATION_SUFFIX)
    }
}

impl IsolationHeaders {
    /// Create a rewriter for URLs ending with `suffix`.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// The configured suffix.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether the response URL ends with the configured suffix.
    pub fn matches(&self, response: &Response) -> bool {
        response
            .url
            .as_ref()
            .is_some_and(|url| url.as_str().ends_with(&self.suffix))
    }

    /// Rewrite the response if it matches, otherwise pass it through
    /// unchanged.
    pub fn apply(&self, response: Response) -> Response {
        if self.matches(&response) {
            inject_isolation_headers(response)
        } else {
            response
        }
    }
}

/// Add (or overwrite) both isolation headers, keeping body, status, status
/// text and every other header.
pub fn inject_isolation_headers(mut response: Response) -> Response {
    response.headers.insert(
        HeaderName::from_static(header_names::CROSS_ORIGIN_EMBEDDER_POLICY),
        HeaderValue::from_static(header_names::REQUIRE_CORP),
    );
    response.headers.insert(
        HeaderName::from_static(header_names::CROSS_ORIGIN_OPENER_POLICY),
        HeaderValue::from_static(header_names::SAME_ORIGIN),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderMap, CONTENT_TYPE};
    use http::StatusCode;
    use url::Url;

    fn response_from(url: &str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/javascript"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));
        Response::new(StatusCode::OK, headers, "export default 1;")
            .with_status_text("Fine")
            .with_url(Url::parse(url).unwrap())
    }

    #[test]
    fn test_matching_url_gets_headers() {
        let rewritten = IsolationHeaders::default().apply(response_from("https://host.test/app/widget.mjs"));

        assert_eq!(rewritten.header("Cross-Origin-Embedder-Policy"), Some("require-corp"));
        assert_eq!(rewritten.header("Cross-Origin-Opener-Policy"), Some("same-origin"));
        assert_eq!(rewritten.header("x-custom"), Some("kept"));
        assert_eq!(rewritten.header("content-type"), Some("text/javascript"));
        assert_eq!(rewritten.status, StatusCode::OK);
        assert_eq!(rewritten.status_text, "Fine");
        assert_eq!(rewritten.body_text().unwrap(), "export default 1;");
    }

    #[test]
    fn test_non_matching_url_passes_through() {
        let original = response_from("https://host.test/app/main.js");
        let passed = IsolationHeaders::default().apply(original.clone());
        assert_eq!(passed.headers, original.headers);
    }

    #[test]
    fn test_suffix_must_be_at_end() {
        let rewriter = IsolationHeaders::default();
        assert!(!rewriter.matches(&response_from("https://host.test/widget.mjs?v=2")));
        assert!(!rewriter.matches(&response_from("https://host.test/widget.mjs.map")));
    }

    #[test]
    fn test_response_without_url_never_matches() {
        assert!(!IsolationHeaders::default().matches(&Response::text("ok")));
    }

    #[test]
    fn test_existing_headers_are_overwritten() {
        let mut original = response_from("https://host.test/widget.mjs");
        original
            .headers
            .insert(header_names::CROSS_ORIGIN_OPENER_POLICY, HeaderValue::from_static("unsafe-none"));

        let rewritten = IsolationHeaders::default().apply(original);
        let values: Vec<_> = rewritten
            .headers
            .get_all(header_names::CROSS_ORIGIN_OPENER_POLICY)
            .iter()
            .collect();
        assert_eq!(values, vec![&HeaderValue::from_static("same-origin")]);
    }

    #[test]
    fn test_custom_suffix() {
        let rewriter = IsolationHeaders::new("runtime.mjs");
        assert_eq!(rewriter.suffix(), "runtime.mjs");
        assert!(rewriter.matches(&response_from("https://host.test/runtime.mjs")));
        assert!(!rewriter.matches(&response_from("https://host.test/widget.mjs")));
    }
}
