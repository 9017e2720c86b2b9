//! Network fetch primitive.

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{InterceptedRequest, Response};

/// Error type for fetch operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),
}

/// Performs an actual network fetch.
///
/// A fetch that completes with any HTTP status is a success; only transport
/// failures are errors. Implementations set `Response::url` to the URL the
/// response came from.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request over the network.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, FetchError>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, FetchError> {
        (**self).fetch(request).await
    }
}

/// Outbound HTTP through the Spin host.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinFetcher;

#[cfg(target_arch = "wasm32")]
#[async_trait]
impl Fetcher for SpinFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, FetchError> {
        use http::header::{HeaderMap, HeaderName, HeaderValue};
        use http::StatusCode;
        use spin_sdk::http::{Method as SpinMethod, Request};

        let method = match *request.method() {
            http::Method::GET => SpinMethod::Get,
            http::Method::POST => SpinMethod::Post,
            http::Method::PUT => SpinMethod::Put,
            http::Method::PATCH => SpinMethod::Patch,
            http::Method::DELETE => SpinMethod::Delete,
            http::Method::HEAD => SpinMethod::Head,
            http::Method::OPTIONS => SpinMethod::Options,
            ref other => return Err(FetchError::Request(format!("unsupported method {}", other))),
        };

        let mut builder = Request::builder();
        builder.method(method);
        builder.uri(request.url().as_str());
        if let Some(body) = request.body() {
            builder.body(body.to_vec());
        }

        let resp: spin_sdk::http::Response = spin_sdk::http::send(builder.build())
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        let status = StatusCode::from_u16(*resp.status())
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in resp.headers() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }

        Ok(Response::new(status, headers, resp.body().to_vec()).with_url(request.url().clone()))
    }
}
