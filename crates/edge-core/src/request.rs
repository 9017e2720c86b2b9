//! Intercepted request model.

use bytes::Bytes;
use http::Method;
use url::{Origin, Url};

/// A request observed by the interception layer.
///
/// Fields are private so the request cannot change once the router has
/// classified it.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: Method,
    url: Url,
    body: Option<Bytes>,
}

impl InterceptedRequest {
    /// Create a new request without a body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse an absolute URL and create a request.
    pub fn parse(method: Method, url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(method, Url::parse(url)?))
    }

    /// Attach a request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Origin of the request URL.
    pub fn origin(&self) -> Origin {
        self.url.origin()
    }

    /// Path component of the request URL.
    pub fn pathname(&self) -> &str {
        self.url.path()
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Whether this is a read (GET) request.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }

    /// Whether the URL uses an HTTP-family scheme.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

impl std::fmt::Display for InterceptedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
