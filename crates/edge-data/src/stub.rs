//! In-process fetcher for development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use edge_core::{InterceptedRequest, Response};
use parking_lot::Mutex;

use crate::client::{FetchError, Fetcher};

enum Route {
    Respond(Response),
    Fail(String),
}

/// Fetcher that answers from a fixed routing table instead of the network.
///
/// Unrouted URLs fail with a connection error, which is what a real fetch
/// does while offline.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
}

impl StubFetcher {
    /// Create an empty fetcher (every request fails).
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub fn with_response(self, url: &str, response: Response) -> Self {
        self.set_response(url, response);
        self
    }

    /// Fail requests to `url` with a connection error.
    pub fn with_failure(self, url: &str, message: impl Into<String>) -> Self {
        self.set_failure(url, message);
        self
    }

    /// Delay every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replace the response for `url`.
    pub fn set_response(&self, url: &str, response: Response) {
        self.routes
            .lock()
            .insert(url.to_string(), Route::Respond(response));
    }

    /// Replace the route for `url` with a failure.
    pub fn set_failure(&self, url: &str, message: impl Into<String>) {
        self.routes
            .lock()
            .insert(url.to_string(), Route::Fail(message.into()));
    }

    /// Total number of fetches started.
    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of fetches started for `url`.
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| *u == url).count()
    }

    /// Number of fetches started but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, FetchError> {
        let url = request.url().as_str().to_string();
        self.calls.lock().push(url.clone());
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let result = match self.routes.lock().get(&url) {
            Some(Route::Respond(response)) => Ok(response.clone().with_url(request.url().clone())),
            Some(Route::Fail(message)) => Err(FetchError::Connection(message.clone())),
            None => Err(FetchError::Connection(format!("no route to {}", url))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(url = %url, ok = result.is_ok(), "stub fetch");
        result
    }
}
