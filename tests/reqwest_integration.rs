//! Integration tests for the transport over real HTTP
//!
//! These tests run `ReqwestExecutor` against a local `wiremock` server to verify
//! that status classification, body replay and limiter drains work end to end,
//! plus a raw TCP server for connections closed before a response.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use registry_transport::initialization::init_client;
use registry_transport::{
    HostLimit, InvocationContext, LimiterRegistry, RateLimitedRetryingTransport, Request,
    HostLimiter, RequestExecutor, ReqwestExecutor, RetryPolicy, RetryReason, TransportConfig,
    TransportStats,
};

/// Fast pacing so the tests do not spend whole seconds between attempts.
fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        retry_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

fn executor() -> ReqwestExecutor {
    let config = TransportConfig {
        timeout_seconds: 5,
        user_agent: "registry_transport_test/1.0".to_string(),
        ..Default::default()
    };
    ReqwestExecutor::new(init_client(&config).expect("client builds"))
}

fn server_url(server: &MockServer, p: &str) -> url::Url {
    url::Url::parse(&format!("{}{}", server.uri(), p)).expect("valid url")
}

/// A registry limiting the mock server's host to a burst of 5 at 50/s.
fn local_registry() -> LimiterRegistry {
    LimiterRegistry::from_limits(&[HostLimit {
        host: "127.0.0.1".to_string(),
        permits: 50,
        window: Duration::from_secs(1),
        burst: 5,
    }])
}

#[tokio::test]
async fn test_429_then_success_drains_limiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/library/alpine/tags/list"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/library/alpine/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"tags\":[\"latest\"]}"))
        .mount(&server)
        .await;

    let registry = local_registry();
    let url = server_url(&server, "/v2/library/alpine/tags/list");
    let stats = Arc::new(TransportStats::new());
    let transport = RateLimitedRetryingTransport::for_url(executor(), &registry, &url)
        .with_policy(fast_policy())
        .with_stats(Arc::clone(&stats));
    assert!(transport.limiter().is_limited());

    let ctx = InvocationContext::new().with_timeout(Duration::from_secs(10));
    let response = transport
        .execute(Request::get(url), &ctx)
        .await
        .expect("retry succeeds");

    assert_eq!(response.status().as_u16(), 200);
    let body = response.bytes().await.expect("body readable");
    assert_eq!(&body[..], b"{\"tags\":[\"latest\"]}");
    assert_eq!(stats.attempts(), 2);
    assert_eq!(stats.drains(), 1);
    registry.shutdown();
}

#[tokio::test]
async fn test_persistent_500_returns_last_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(3)
        .mount(&server)
        .await;

    let registry = local_registry();
    let url = server_url(&server, "/v2/");
    let transport = RateLimitedRetryingTransport::for_url(executor(), &registry, &url)
        .with_policy(fast_policy());

    let ctx = InvocationContext::new().with_timeout(Duration::from_secs(10));
    let response = transport
        .execute(Request::get(url), &ctx)
        .await
        .expect("final 500 is a response");

    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(response.bytes().await.expect("body"), "internal error");
    server.verify().await;
}

#[tokio::test]
async fn test_replayed_upload_body_reaches_server_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/library/alpine/manifests/latest"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2/library/alpine/manifests/latest"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let registry = local_registry();
    let url = server_url(&server, "/v2/library/alpine/manifests/latest");
    let transport = RateLimitedRetryingTransport::for_url(executor(), &registry, &url)
        .with_policy(fast_policy());

    let manifest = "{\"schemaVersion\":2}";
    let request = Request::new(reqwest::Method::PUT, url).with_replayable_body(manifest);
    let ctx = InvocationContext::new().with_timeout(Duration::from_secs(10));
    let response = transport.execute(request, &ctx).await.expect("upload succeeds");
    assert_eq!(response.status().as_u16(), 201);

    let received = server
        .received_requests()
        .await
        .expect("request recording enabled");
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|r| r.body == manifest.as_bytes()));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/missing/manifests/latest"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = server_url(&server, "/v2/missing/manifests/latest");
    let registry = LimiterRegistry::with_defaults();
    let transport = RateLimitedRetryingTransport::for_url(executor(), &registry, &url);
    // 127.0.0.1 is not a registered host here
    assert!(!transport.limiter().is_limited());

    let response = transport
        .execute(Request::get(url), &InvocationContext::new())
        .await
        .expect("404 is a response");
    assert_eq!(response.status().as_u16(), 404);
    server.verify().await;
}

/// Serves HTTP/1.1 on a local port, closing the first `drop_first` connections
/// right after reading the request. Returns the base URL and a connection counter.
async fn flaky_server(drop_first: usize) -> (url::Url, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local address");
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let seen = counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            if seen < drop_first {
                drop(stream);
                continue;
            }
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await;
            let _ = stream.shutdown().await;
        }
    });
    let url = url::Url::parse(&format!("http://{}/v2/", addr)).expect("valid url");
    (url, connections)
}

#[tokio::test]
async fn test_connection_closed_before_response_is_retried() {
    let (url, connections) = flaky_server(1).await;
    let stats = Arc::new(TransportStats::new());
    let transport = RateLimitedRetryingTransport::new(executor(), HostLimiter::Unlimited)
        .with_policy(fast_policy())
        .with_stats(Arc::clone(&stats));

    let ctx = InvocationContext::new().with_timeout(Duration::from_secs(5));
    let response = transport
        .execute(Request::get(url), &ctx)
        .await
        .expect("premature close is retried");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.bytes().await.expect("body"), "ok");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert_eq!(stats.get_retry_count(RetryReason::Transient), 1);
}
