//! Request classification and dispatch.

use std::sync::Arc;

use edge_broadcast::{BroadcastChannel, BroadcastCorrelator};
use edge_cache::{CacheAsideFetcher, CacheStore};
use edge_core::{InterceptedRequest, RequestId, Response, WaitUntil};
use edge_data::Fetcher;
use url::Origin;

use crate::error::InterceptError;
use crate::markers::{API_MARKER, BROADCAST_MARKERS, HEARTBEAT_BODY, HEARTBEAT_PATH};

/// Outcome of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Answer the liveness check directly.
    Heartbeat,
    /// Forward to another context over the broadcast channel.
    Broadcast,
    /// Do not intercept.
    Passthrough,
    /// Serve through the cache-aside fetcher.
    CacheAside,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heartbeat => write!(f, "heartbeat"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::Passthrough => write!(f, "passthrough"),
            Self::CacheAside => write!(f, "cache-aside"),
        }
    }
}

/// A routing rule: the first rule whose predicate holds decides the route.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&InterceptedRequest, &Origin) -> bool,
    pub route: Route,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("route", &self.route)
            .finish()
    }
}

/// Routing rules in priority order. Requests matching none of them take
/// [`Route::CacheAside`].
pub const RULES: &[Rule] = &[
    Rule {
        name: "heartbeat",
        matches: is_heartbeat,
        route: Route::Heartbeat,
    },
    Rule {
        name: "same-origin-broadcast",
        matches: is_same_origin_broadcast,
        route: Route::Broadcast,
    },
    Rule {
        name: "non-read",
        matches: is_not_read,
        route: Route::Passthrough,
    },
    Rule {
        name: "non-http",
        matches: is_not_http,
        route: Route::Passthrough,
    },
    Rule {
        name: "api",
        matches: is_api,
        route: Route::Passthrough,
    },
];

fn is_heartbeat(request: &InterceptedRequest, _origin: &Origin) -> bool {
    request.pathname() == HEARTBEAT_PATH
}

fn is_same_origin_broadcast(request: &InterceptedRequest, origin: &Origin) -> bool {
    request.origin() == *origin
        && BROADCAST_MARKERS
            .iter()
            .any(|marker| request.pathname().contains(marker))
}

fn is_not_read(request: &InterceptedRequest, _origin: &Origin) -> bool {
    !request.is_read()
}

fn is_not_http(request: &InterceptedRequest, _origin: &Origin) -> bool {
    !request.is_http()
}

fn is_api(request: &InterceptedRequest, _origin: &Origin) -> bool {
    request.pathname().contains(API_MARKER)
}

/// Classify a request against [`RULES`].
///
/// Pure: no I/O, no side effects.
pub fn classify(request: &InterceptedRequest, worker_origin: &Origin) -> Route {
    matching_rule(request, worker_origin).map_or(Route::CacheAside, |rule| rule.route)
}

/// The first rule matching the request, if any.
pub fn matching_rule(request: &InterceptedRequest, worker_origin: &Origin) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|rule| (rule.matches)(request, worker_origin))
}

/// Dispatches each classified request to exactly one handler.
///
/// A router is built for one activation and carries that activation's
/// runtime configuration inside its cache-aside fetcher.
pub struct FetchRouter<S, F, C> {
    origin: Origin,
    cache_aside: CacheAsideFetcher<S, F>,
    correlator: Arc<BroadcastCorrelator<C>>,
}

impl<S, F, C> FetchRouter<S, F, C>
where
    S: CacheStore + 'static,
    F: Fetcher + 'static,
    C: BroadcastChannel + 'static,
{
    pub fn new(
        origin: Origin,
        cache_aside: CacheAsideFetcher<S, F>,
        correlator: Arc<BroadcastCorrelator<C>>,
    ) -> Self {
        Self {
            origin,
            cache_aside,
            correlator,
        }
    }

    /// Origin requests are compared against.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn cache_aside(&self) -> &CacheAsideFetcher<S, F> {
        &self.cache_aside
    }

    /// Route a request. `Ok(None)` means the request is not intercepted.
    pub async fn route(
        &self,
        request: &InterceptedRequest,
        wait_until: &WaitUntil,
    ) -> Result<Option<Response>, InterceptError> {
        let request_id = RequestId::generate();
        let rule = matching_rule(request, &self.origin);
        let route = rule.map_or(Route::CacheAside, |rule| rule.route);

        tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            url = %request.url(),
            route = %route,
            rule = rule.map_or("default", |rule| rule.name),
            "classified request"
        );

        match route {
            Route::Heartbeat => Ok(Some(Response::text(HEARTBEAT_BODY))),
            Route::Passthrough => Ok(None),
            Route::Broadcast => {
                let response = self.correlator.forward(request).await.map_err(|e| {
                    tracing::warn!(request_id = %request_id, error = %e, "forward failed");
                    e
                })?;
                Ok(Some(response))
            }
            Route::CacheAside => {
                let served = self.cache_aside.serve(request, wait_until).await.map_err(|e| {
                    tracing::warn!(request_id = %request_id, error = %e, "cache-aside fetch failed");
                    e
                })?;
                tracing::debug!(
                    request_id = %request_id,
                    cache_status = %served.status,
                    status = %served.response.status,
                    "served request"
                );
                Ok(Some(served.response))
            }
        }
    }
}
