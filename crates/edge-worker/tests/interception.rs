use std::sync::Arc;
use std::time::Duration;

use edge_broadcast::{BroadcastChannel, ForwardError, LocalBroadcastChannel};
use edge_cache::{InMemoryCacheStore, RequestKey};
use edge_core::{InterceptedRequest, Response, WorkerConfig};
use edge_data::{FetchError, StubFetcher};
use edge_worker::{FetchEvent, InterceptError, LocalHost, ServiceWorker};
use futures::StreamExt;
use http::{Method, StatusCode};
use serde_json::{json, Value};
use url::Url;

const SCOPE: &str = "https://host/app/";
const WIDGET: &str = "https://host/app/widget.mjs";
const PAGE: &str = "https://host/app/index.html";

type Worker = ServiceWorker<InMemoryCacheStore, StubFetcher, LocalBroadcastChannel>;

struct Harness {
    worker: Arc<Worker>,
    store: Arc<InMemoryCacheStore>,
    fetcher: Arc<StubFetcher>,
    page: LocalBroadcastChannel,
}

async fn activated(config: WorkerConfig, fetcher: StubFetcher, cache_enabled: bool) -> Harness {
    let store = Arc::new(InMemoryCacheStore::open(&config.cache_name));
    let fetcher = Arc::new(fetcher);
    let channel = LocalBroadcastChannel::open(&config.channel_name);
    let page = channel.handle();

    let worker = ServiceWorker::new(
        config,
        &Url::parse(SCOPE).unwrap(),
        store.clone(),
        fetcher.clone(),
        Arc::new(channel),
        Arc::new(LocalHost::new()),
    );
    worker.install().await.unwrap();

    let activation = if cache_enabled {
        "https://host/app/sw.js?enableCache=true"
    } else {
        "https://host/app/sw.js"
    };
    worker.activate(&Url::parse(activation).unwrap()).await.unwrap();

    Harness {
        worker: Arc::new(worker),
        store,
        fetcher,
        page,
    }
}

fn request(method: Method, url: &str) -> InterceptedRequest {
    InterceptedRequest::parse(method, url).unwrap()
}

fn key(url: &str) -> RequestKey {
    RequestKey::get(&Url::parse(url).unwrap())
}

async fn intercept(h: &Harness, request: InterceptedRequest) -> Result<Option<Response>, InterceptError> {
    let event = FetchEvent::new(request);
    let result = h.worker.handle_fetch(&event).await;
    event.wait_until().settled().await;
    result
}

#[tokio::test]
async fn test_heartbeat_for_any_method_and_config() {
    for cache_enabled in [false, true] {
        let h = activated(WorkerConfig::default(), StubFetcher::new(), cache_enabled).await;

        for method in [Method::GET, Method::POST, Method::DELETE] {
            let response = intercept(&h, request(method, "https://host/api/service-worker-heartbeat"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body_text().unwrap(), "ok");
        }

        assert_eq!(h.fetcher.calls(), 0);
        assert!(h.store.is_empty());
    }
}

#[tokio::test]
async fn test_drive_request_is_forwarded_not_fetched() {
    let h = activated(WorkerConfig::default(), StubFetcher::new(), true).await;
    let mut inbox = h.page.subscribe();

    let forwarded = {
        let worker = h.worker.clone();
        tokio::spawn(async move {
            let event = FetchEvent::new(
                request(Method::GET, "https://host/api/drive/read")
                    .with_body(r#"{"browsingContextId":"tab-1","path":"/notes.txt"}"#),
            );
            worker.handle_fetch(&event).await
        })
    };

    let outbound = inbox.next().await.unwrap();
    assert_eq!(
        outbound,
        json!({"browsingContextId": "tab-1", "pathname": "/api/drive/read", "path": "/notes.txt"})
    );
    h.page
        .post(&json!({"browsingContextId": "tab-1", "response": {"content": "hi"}}))
        .unwrap();

    let response = forwarded.await.unwrap().unwrap().unwrap();
    assert_eq!(response.body_json::<Value>().unwrap(), json!({"content": "hi"}));
    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_concurrent_forwards_resolve_independently() {
    let h = activated(WorkerConfig::default(), StubFetcher::new(), false).await;
    let mut inbox = h.page.subscribe();

    let forward = |id: &'static str| {
        let worker = h.worker.clone();
        tokio::spawn(async move {
            let event = FetchEvent::new(
                request(Method::POST, "https://host/api/stdin")
                    .with_body(format!(r#"{{"browsingContextId":"{}"}}"#, id)),
            );
            worker.handle_fetch(&event).await
        })
    };
    let a = forward("a");
    let b = forward("b");
    inbox.next().await.unwrap();
    inbox.next().await.unwrap();

    h.page.post(&json!({"browsingContextId": "a", "response": "line-a"})).unwrap();
    let response_a = a.await.unwrap().unwrap().unwrap();
    assert_eq!(response_a.body_json::<Value>().unwrap(), json!("line-a"));

    assert!(!b.is_finished());
    assert_eq!(h.worker.correlator().pending_count(), 1);

    h.page.post(&json!({"browsingContextId": "b", "response": "line-b"})).unwrap();
    let response_b = b.await.unwrap().unwrap().unwrap();
    assert_eq!(response_b.body_json::<Value>().unwrap(), json!("line-b"));
    assert_eq!(h.worker.correlator().pending_count(), 0);
}

#[tokio::test]
async fn test_unanswered_forward_times_out() {
    let config = WorkerConfig::default().with_reply_timeout(Duration::from_millis(50));
    let h = activated(config, StubFetcher::new(), false).await;

    let err = intercept(
        &h,
        request(Method::POST, "https://host/api/drive/write").with_body(r#"{"browsingContextId":1}"#),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, InterceptError::Forward(ForwardError::TimedOut { .. })));
    assert_eq!(h.worker.correlator().pending_count(), 0);
}

#[tokio::test]
async fn test_malformed_forward_body_fails() {
    let h = activated(WorkerConfig::default(), StubFetcher::new(), false).await;

    let err = intercept(&h, request(Method::POST, "https://host/api/drive").with_body("not json"))
        .await
        .unwrap_err();

    assert!(matches!(err, InterceptError::Forward(ForwardError::MalformedBody(_))));
}

#[tokio::test]
async fn test_dropped_requests_are_not_intercepted() {
    let h = activated(WorkerConfig::default(), StubFetcher::new(), true).await;

    for (method, url) in [
        (Method::POST, PAGE),
        (Method::PUT, WIDGET),
        (Method::GET, "ftp://host/app/file.txt"),
        (Method::GET, "https://host/api/users"),
        (Method::GET, "https://elsewhere/api/drive/read"),
    ] {
        assert!(intercept(&h, request(method, url)).await.unwrap().is_none(), "{}", url);
    }

    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_cache_disabled_fetches_every_time() {
    let fetcher = StubFetcher::new().with_response(PAGE, Response::text("page"));
    let h = activated(WorkerConfig::default(), fetcher, false).await;

    for _ in 0..4 {
        let response = intercept(&h, request(Method::GET, PAGE)).await.unwrap().unwrap();
        assert_eq!(response.body_text().unwrap(), "page");
    }

    assert_eq!(h.fetcher.calls_for(PAGE), 4);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_cache_miss_then_hit_with_refresh() {
    let fetcher = StubFetcher::new().with_response(PAGE, Response::text("v1"));
    let h = activated(WorkerConfig::default(), fetcher, true).await;

    let first = intercept(&h, request(Method::GET, PAGE)).await.unwrap().unwrap();
    assert_eq!(first.body_text().unwrap(), "v1");
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.store.get(&key(PAGE)).unwrap().body_text().unwrap(), "v1");

    h.fetcher.set_response(PAGE, Response::text("v2"));
    let second = intercept(&h, request(Method::GET, PAGE)).await.unwrap().unwrap();

    assert_eq!(second.body_text().unwrap(), "v1");
    assert_eq!(h.fetcher.calls(), 2);
    assert_eq!(h.store.get(&key(PAGE)).unwrap().body_text().unwrap(), "v2");
}

#[tokio::test]
async fn test_cache_miss_network_failure_propagates() {
    let fetcher = StubFetcher::new().with_failure(PAGE, "offline");
    let h = activated(WorkerConfig::default(), fetcher, true).await;

    let err = intercept(&h, request(Method::GET, PAGE)).await.unwrap_err();

    assert!(matches!(err, InterceptError::Fetch(FetchError::Connection(_))));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_widget_gets_isolation_headers_and_is_cached() {
    let fetcher = StubFetcher::new().with_response(WIDGET, Response::text("export {}"));
    let h = activated(WorkerConfig::default(), fetcher, true).await;

    let response = intercept(&h, request(Method::GET, WIDGET)).await.unwrap().unwrap();

    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(response.header("Cross-Origin-Embedder-Policy"), Some("require-corp"));
    assert_eq!(response.header("Cross-Origin-Opener-Policy"), Some("same-origin"));
    assert!(h.store.contains(&key(WIDGET)));

    let cached = intercept(&h, request(Method::GET, WIDGET)).await.unwrap().unwrap();
    assert_eq!(cached.header("Cross-Origin-Embedder-Policy"), Some("require-corp"));
    assert_eq!(cached.header("Cross-Origin-Opener-Policy"), Some("same-origin"));
}

#[tokio::test]
async fn test_other_responses_keep_upstream_headers() {
    let upstream = Response::text("page");
    let fetcher = StubFetcher::new().with_response(PAGE, upstream.clone());
    let h = activated(WorkerConfig::default(), fetcher, false).await;

    let response = intercept(&h, request(Method::GET, PAGE)).await.unwrap().unwrap();

    assert_eq!(response.headers, upstream.headers);
}

#[tokio::test]
async fn test_custom_isolation_suffix_from_config() {
    let config = WorkerConfig::from_toml_str(r#"isolation_suffix = "runtime.mjs""#).unwrap();
    let runtime = "https://host/app/runtime.mjs";
    let fetcher = StubFetcher::new()
        .with_response(runtime, Response::text("r"))
        .with_response(WIDGET, Response::text("w"));
    let h = activated(config, fetcher, false).await;

    let rewritten = intercept(&h, request(Method::GET, runtime)).await.unwrap().unwrap();
    let plain = intercept(&h, request(Method::GET, WIDGET)).await.unwrap().unwrap();

    assert_eq!(rewritten.header("cross-origin-opener-policy"), Some("same-origin"));
    assert_eq!(plain.header("cross-origin-opener-policy"), None);
}
