//! Stale-while-revalidate (cache-aside) serving.

use std::sync::Arc;

use edge_core::{InterceptedRequest, Response, RuntimeConfig, WaitUntil};
use edge_data::{FetchError, Fetcher};
use http::StatusCode;

use crate::headers::IsolationHeaders;
use crate::key::RequestKey;
use crate::store::{CacheError, CacheStore};

/// Errors surfaced to the caller of [`CacheAsideFetcher::serve`].
#[derive(Debug, thiserror::Error)]
pub enum CacheAsideError {
    /// The network fetch failed and no usable cached entry exists.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The cache store failed while looking up an entry.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Path taken to produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache; a background refresh was started.
    Hit,
    /// Fetched from the network; a copy is being stored.
    Miss,
    /// Caching disabled; fetched from the network only.
    Bypass,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}

/// A response together with the path that produced it.
#[derive(Debug, Clone)]
pub struct Served {
    /// Response handed back to the caller.
    pub response: Response,
    /// Cache path taken.
    pub status: CacheStatus,
}

/// Serves requests with a stale-while-revalidate discipline.
///
/// - Caching disabled: fetch from the network, nothing is read or written.
/// - Hit: return the stored entry, refresh it in the background.
/// - Miss: fetch from the network, return it, store a copy in the background.
///
/// Stored entries with status 404 are treated as a miss. Background work is
/// spawned on the supplied [`WaitUntil`] and never awaited here.
pub struct CacheAsideFetcher<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    config: RuntimeConfig,
    isolation: IsolationHeaders,
}

impl<S, F> CacheAsideFetcher<S, F>
where
    S: CacheStore + 'static,
    F: Fetcher + 'static,
{
    /// Create a fetcher for one activation's runtime configuration.
    pub fn new(store: Arc<S>, fetcher: Arc<F>, config: RuntimeConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
            isolation: IsolationHeaders::default(),
        }
    }

    /// Set the isolation header rewriter.
    pub fn with_isolation(mut self, isolation: IsolationHeaders) -> Self {
        self.isolation = isolation;
        self
    }

    /// The runtime configuration this fetcher was built with.
    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    /// Serve a request.
    pub async fn serve(
        &self,
        request: &InterceptedRequest,
        wait_until: &WaitUntil,
    ) -> Result<Served, CacheAsideError> {
        if !self.config.cache_enabled {
            let response = self.fetcher.fetch(request).await?;
            return Ok(Served {
                response: self.isolation.apply(response),
                status: CacheStatus::Bypass,
            });
        }

        let key = RequestKey::for_request(request);

        let cached = self
            .store
            .match_request(&key)
            .await?
            .filter(|entry| entry.status != StatusCode::NOT_FOUND);

        if let Some(entry) = cached {
            tracing::debug!(key = %key, "cache hit, refreshing in background");
            self.spawn_refresh(request.clone(), key, wait_until);
            return Ok(Served {
                response: self.isolation.apply(entry),
                status: CacheStatus::Hit,
            });
        }

        let response = self.fetcher.fetch(request).await?;
        tracing::debug!(key = %key, status = %response.status, "cache miss, storing copy");
        self.spawn_store(key, response.clone(), wait_until);

        Ok(Served {
            response: self.isolation.apply(response),
            status: CacheStatus::Miss,
        })
    }

    fn spawn_refresh(&self, request: InterceptedRequest, key: RequestKey, wait_until: &WaitUntil) {
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        wait_until.spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(fresh) => {
                    if let Err(e) = store.put(key.clone(), fresh).await {
                        tracing::warn!(key = %key, error = %e, "failed to store refreshed entry");
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "background refresh failed");
                }
            }
        });
    }

    fn spawn_store(&self, key: RequestKey, response: Response, wait_until: &WaitUntil) {
        let store = self.store.clone();
        wait_until.spawn(async move {
            if let Err(e) = store.put(key.clone(), response).await {
                tracing::warn!(key = %key, error = %e, "failed to store fetched entry");
            }
        });
    }
}
