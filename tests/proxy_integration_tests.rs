//! Integration Tests for the Proxy
//!
//! Runs the real listener against a stub origin and drives it with an HTTP
//! client configured to use the proxy, plus the admin API over its router.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use caching_proxy::{
    api::create_router, cache::MAX_OBJECT_SIZE, AppState, CacheStore, Config, ConnectionHandler,
    ProxyListener,
};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

// == Helper Functions ==

/// Origin that answers every request with `body` and counts connections.
async fn spawn_origin(body: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!("HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
            });
        }
    });

    (addr, hits)
}

/// Starts the proxy on an ephemeral port, returning its address and cache.
async fn spawn_proxy() -> (SocketAddr, Arc<CacheStore>) {
    let config = Config::default();
    let cache = Arc::new(CacheStore::from_config(&config));
    let listener = ProxyListener::bind("127.0.0.1:0".parse().unwrap(), config.max_connections)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = ConnectionHandler::from_config(cache.clone(), &config);
    tokio::spawn(listener.serve(handler));
    (addr, cache)
}

fn proxied_client(proxy: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy)).unwrap())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Sends raw bytes to the proxy and collects everything it writes back.
async fn raw_exchange(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut received = Vec::new();
    let _ = stream.read_to_end(&mut received).await;
    received
}

/// Polls `condition` until it holds, failing the test after five seconds.
///
/// The proxy stores a response only after the origin closes, which can be
/// after the client has already read the whole body.
async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {}", what);
}

// == End-to-End Scenarios ==

#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let (origin, hits) = spawn_origin(b"hello".to_vec()).await;
    let (proxy, cache) = spawn_proxy().await;
    let client = proxied_client(proxy);
    let url = format!("http://{}/a.html", origin);

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    assert_eq!(first.text().await.unwrap(), "hello");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    wait_for("first response to be cached", || cache.contains(&url)).await;

    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::OK);
    assert_eq!(second.text().await.unwrap(), "hello");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().hits, 1);
}

#[tokio::test]
async fn test_raw_bytes_are_relayed_unmodified() {
    let (origin, hits) = spawn_origin(b"hello".to_vec()).await;
    let (proxy, _) = spawn_proxy().await;
    let request = format!(
        "GET http://{}/a.html HTTP/1.1\r\nHost: example.com\r\n\r\n",
        origin
    );
    let expected = b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec();

    assert_eq!(raw_exchange(proxy, request.as_bytes()).await, expected);
    assert_eq!(raw_exchange(proxy, request.as_bytes()).await, expected);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_post_is_closed_without_reply() {
    let (origin, hits) = spawn_origin(b"hello".to_vec()).await;
    let (proxy, cache) = spawn_proxy().await;
    let request = format!(
        "POST http://{}/form HTTP/1.1\r\nHost: example.com\r\nContent-Length: 0\r\n\r\n",
        origin
    );

    let received = raw_exchange(proxy, request.as_bytes()).await;

    assert!(received.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_oversized_response_relayed_but_not_cached() {
    let body = vec![b'x'; 200_000];
    assert!(body.len() > MAX_OBJECT_SIZE);
    let (origin, hits) = spawn_origin(body.clone()).await;
    let (proxy, cache) = spawn_proxy().await;
    let client = proxied_client(proxy);
    let url = format!("http://{}/big.bin", origin);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.bytes().await.unwrap().len(), body.len());
    assert!(!cache.contains(&url));
    assert_eq!(cache.stats().rejected, 0);

    client.get(&url).send().await.unwrap().bytes().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_clients_share_cache() {
    let (origin, _) = spawn_origin(b"shared".to_vec()).await;
    let (proxy, cache) = spawn_proxy().await;

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = proxied_client(proxy);
        let url = format!("http://{}/item/{}", origin, i % 4);
        tasks.push(tokio::spawn(async move {
            client.get(&url).send().await.unwrap().text().await.unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), "shared");
    }

    wait_for("all four items to be cached", || cache.len() == 4).await;
    wait_for("in-flight inserts to finish", || {
        let stats = cache.stats();
        stats.misses == stats.insertions
    })
    .await;
    assert_eq!(cache.len(), 4);
    assert_eq!(cache.total_size(), cache.stats().total_bytes);
}

// == Admin API ==

#[tokio::test]
async fn test_admin_stats_reflect_proxy_traffic() {
    let (origin, _) = spawn_origin(b"hello".to_vec()).await;
    let (proxy, cache) = spawn_proxy().await;
    let client = proxied_client(proxy);
    let url = format!("http://{}/a.html", origin);
    client.get(&url).send().await.unwrap().text().await.unwrap();
    wait_for("first response to be cached", || cache.contains(&url)).await;
    client.get(&url).send().await.unwrap().text().await.unwrap();

    let app = create_router(AppState::new(cache));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
}
