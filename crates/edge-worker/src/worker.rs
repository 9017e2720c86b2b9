//! Worker lifecycle: install, activate, intercept.

use std::sync::Arc;

use edge_broadcast::{BroadcastChannel, BroadcastCorrelator};
use edge_cache::{CacheAsideFetcher, CacheStore, IsolationHeaders, RequestKey};
use edge_core::{InterceptedRequest, Response, RuntimeConfig, WaitUntil, WorkerConfig, WorkerState};
use edge_data::Fetcher;
use futures::future::try_join_all;
use parking_lot::RwLock;
use url::{Origin, Url};

use crate::error::{InterceptError, LifecycleError};
use crate::host::WorkerHost;
use crate::router::FetchRouter;

/// An intercepted request together with its deferred completion handle.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    request: InterceptedRequest,
    wait_until: WaitUntil,
}

impl FetchEvent {
    pub fn new(request: InterceptedRequest) -> Self {
        Self {
            request,
            wait_until: WaitUntil::new(),
        }
    }

    pub fn request(&self) -> &InterceptedRequest {
        &self.request
    }

    /// Background work started while handling this event. The host awaits
    /// [`WaitUntil::settled`] before releasing the worker.
    pub fn wait_until(&self) -> &WaitUntil {
        &self.wait_until
    }
}

/// Lifecycle manager for one worker instance.
///
/// Intercepts are only handled once the worker is activated; before that,
/// every request passes through. Each activation derives a fresh
/// [`RuntimeConfig`] from its URL and swaps in a router built with it.
pub struct ServiceWorker<S, F, C> {
    config: WorkerConfig,
    origin: Origin,
    store: Arc<S>,
    fetcher: Arc<F>,
    correlator: Arc<BroadcastCorrelator<C>>,
    host: Arc<dyn WorkerHost>,
    state: RwLock<WorkerState>,
    router: RwLock<Option<Arc<FetchRouter<S, F, C>>>>,
}

impl<S, F, C> ServiceWorker<S, F, C>
where
    S: CacheStore + 'static,
    F: Fetcher + 'static,
    C: BroadcastChannel + 'static,
{
    /// Create a worker serving `scope`. Must be called inside a tokio
    /// runtime.
    pub fn new(
        config: WorkerConfig,
        scope: &Url,
        store: Arc<S>,
        fetcher: Arc<F>,
        channel: Arc<C>,
        host: Arc<dyn WorkerHost>,
    ) -> Self {
        if store.name() != config.cache_name {
            tracing::warn!(
                store = %store.name(),
                configured = %config.cache_name,
                "cache store name differs from configured cache name"
            );
        }

        let correlator = Arc::new(BroadcastCorrelator::new(channel, config.reply_timeout()));
        Self {
            origin: scope.origin(),
            config,
            store,
            fetcher,
            correlator,
            host,
            state: RwLock::new(WorkerState::Parsed),
            router: RwLock::new(None),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn correlator(&self) -> &Arc<BroadcastCorrelator<C>> {
        &self.correlator
    }

    /// Runtime configuration of the current activation.
    pub fn runtime_config(&self) -> Option<RuntimeConfig> {
        self.router
            .read()
            .as_ref()
            .map(|router| router.cache_aside().config())
    }

    /// Handle the install event: skip waiting, then seed the cache.
    ///
    /// Seeding is all-or-nothing. Any failed or non-2xx seed fetch fails the
    /// install and leaves the store untouched.
    pub async fn install(&self) -> Result<(), LifecycleError> {
        self.transition("install", &[WorkerState::Parsed], |_| WorkerState::Installing)?;

        let result = self.run_install().await;
        self.settle(&result, WorkerState::Installed);
        result
    }

    async fn run_install(&self) -> Result<(), LifecycleError> {
        self.host.skip_waiting().await?;

        let urls = self.config.parsed_precache_urls()?;
        if urls.is_empty() {
            tracing::debug!(cache = %self.store.name(), "no precache urls, skipping seed");
            return Ok(());
        }

        let entries = try_join_all(urls.iter().map(|url| self.fetch_seed(url))).await?;
        let count = entries.len();
        self.store.add_all(entries).await?;
        tracing::info!(cache = %self.store.name(), count, "seeded cache");
        Ok(())
    }

    async fn fetch_seed(&self, url: &Url) -> Result<(RequestKey, Response), LifecycleError> {
        let request = InterceptedRequest::get(url.clone());
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_success() {
            return Err(LifecycleError::SeedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok((RequestKey::for_request(&request), response))
    }

    /// Handle the activate event for the URL the worker was activated with.
    ///
    /// A worker may be activated again; the new runtime configuration
    /// replaces the previous one for requests routed afterwards. An
    /// activated worker stays activated while it re-activates, so requests
    /// keep being intercepted until the host claim settles.
    pub async fn activate(&self, activation_url: &Url) -> Result<RuntimeConfig, LifecycleError> {
        self.transition(
            "activate",
            &[WorkerState::Installed, WorkerState::Activated],
            |current| match current {
                WorkerState::Activated => WorkerState::Activated,
                _ => WorkerState::Activating,
            },
        )?;

        let runtime = RuntimeConfig::from_activation_url(activation_url);
        let cache_aside = CacheAsideFetcher::new(self.store.clone(), self.fetcher.clone(), runtime)
            .with_isolation(IsolationHeaders::new(self.config.isolation_suffix.clone()));
        let router = FetchRouter::new(self.origin.clone(), cache_aside, self.correlator.clone());
        *self.router.write() = Some(Arc::new(router));

        let result = self.host.claim_clients().await;
        self.settle(&result, WorkerState::Activated);
        result?;

        tracing::info!(cache_enabled = runtime.cache_enabled, "worker activated");
        Ok(runtime)
    }

    /// Handle an intercepted request.
    ///
    /// `Ok(None)` means the request is not intercepted and the host should
    /// apply its default handling.
    pub async fn handle_fetch(&self, event: &FetchEvent) -> Result<Option<Response>, InterceptError> {
        if !self.state().can_intercept() {
            tracing::trace!(state = %self.state(), url = %event.request.url(), "not activated, passing through");
            return Ok(None);
        }

        let router = self.router.read().clone();
        match router {
            Some(router) => router.route(&event.request, &event.wait_until).await,
            None => Ok(None),
        }
    }

    fn transition(
        &self,
        event: &'static str,
        allowed: &[WorkerState],
        next: impl FnOnce(WorkerState) -> WorkerState,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.write();
        let current = *state;
        if !allowed.contains(&current) {
            return Err(LifecycleError::InvalidState {
                event,
                state: current,
            });
        }
        self.set(&mut state, next(current));
        Ok(())
    }

    fn settle<T>(&self, result: &Result<T, LifecycleError>, on_success: WorkerState) {
        let next = match result {
            Ok(_) => on_success,
            Err(e) => {
                tracing::warn!(error = %e, "lifecycle event failed, worker is redundant");
                WorkerState::Redundant
            }
        };
        self.set(&mut self.state.write(), next);
    }

    fn set(&self, state: &mut WorkerState, next: WorkerState) {
        if *state != next {
            tracing::info!(from = %*state, to = %next, "worker state change");
            *state = next;
        }
    }
}
