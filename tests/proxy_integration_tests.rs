//! Integration Tests for the Proxy
//!
//! Drives a running proxy over loopback sockets against a fake origin.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use caching_proxy::{Config, ProxyError, ProxyServer, SharedCache};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// == Helper Functions ==

/// Origin that serves fixed responses by path and counts requests per path.
struct FakeOrigin {
    addr: SocketAddr,
    routes: Arc<HashMap<String, Vec<u8>>>,
    requests: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeOrigin {
    async fn start(routes: Vec<(&str, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<HashMap<String, Vec<u8>>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, response)| (path.to_string(), response))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(HashMap::new()));

        let (served_routes, served_requests) = (routes.clone(), requests.clone());
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let routes = served_routes.clone();
                let requests = served_requests.clone();
                tokio::spawn(async move {
                    let head = read_head(&mut socket).await;
                    let path = head
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or_default()
                        .to_string();
                    *requests.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

                    let response = routes
                        .get(&path)
                        .cloned()
                        .unwrap_or_else(|| http_response(404, b"not found"));
                    socket.write_all(&response).await.unwrap();
                    socket.shutdown().await.unwrap();
                });
            }
        });

        Self {
            addr,
            routes,
            requests,
        }
    }

    fn host(&self) -> String {
        self.addr.to_string()
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn response(&self, path: &str) -> Vec<u8> {
        self.routes[path].clone()
    }

    fn requests(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn http_response(status: u16, body: &[u8]) -> Vec<u8> {
    let reason = if status == 200 { "OK" } else { "Not Found" };
    let mut response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

struct RunningProxy {
    addr: SocketAddr,
    cache: SharedCache,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ProxyError>>,
}

impl RunningProxy {
    async fn start(capacity: u64) -> Self {
        let mut config = Config::new(capacity);
        config.host = "127.0.0.1".parse().unwrap();

        let server = ProxyServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let cache = server.cache();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            let _ = stop_rx.await;
        }));

        Self {
            addr,
            cache,
            stop: Some(stop_tx),
            handle,
        }
    }

    async fn get(&self, url: &str, host: &str) -> Vec<u8> {
        let request = format!("GET {url} HTTP/1.1\r\nHost: {host}\r\nAccept: */*\r\n\r\n");
        self.send(request.as_bytes()).await
    }

    async fn send(&self, request: &[u8]) -> Vec<u8> {
        let mut client = TcpStream::connect(self.addr).await.unwrap();
        client.write_all(request).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        response
    }

    async fn order(&self) -> Vec<String> {
        self.cache.lock().await.order()
    }

    async fn stop(mut self) -> Result<(), ProxyError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await.unwrap()
    }
}

// == Hit / Miss ==

#[tokio::test]
async fn test_miss_then_hit() {
    let origin = FakeOrigin::start(vec![("/page", http_response(200, b"<h1>hello</h1>"))]).await;
    let proxy = RunningProxy::start(10_000).await;
    let url = origin.url("/page");

    let first = proxy.get(&url, &origin.host()).await;
    let second = proxy.get(&url, &origin.host()).await;

    assert_eq!(first, origin.response("/page"));
    assert_eq!(second, first);
    assert_eq!(origin.requests("/page"), 1);

    let stats = proxy.cache.lock().await.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.used_bytes, first.len() as u64);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn test_binary_payload_relayed_byte_exact() {
    let payload: Vec<u8> = (0..400_000u32).map(|i| (i * 31 % 256) as u8).collect();
    let origin = FakeOrigin::start(vec![("/blob.bin", http_response(200, &payload))]).await;
    let proxy = RunningProxy::start(1_000_000).await;
    let url = origin.url("/blob.bin");

    let miss = proxy.get(&url, &origin.host()).await;
    let hit = proxy.get(&url, &origin.host()).await;

    assert_eq!(miss, origin.response("/blob.bin"));
    assert_eq!(hit, miss);
    assert_eq!(origin.requests("/blob.bin"), 1);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn test_response_without_content_length_is_cached_and_served() {
    let raw = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nno length here".to_vec();
    let origin = FakeOrigin::start(vec![("/bare", raw.clone())]).await;
    let proxy = RunningProxy::start(10_000).await;
    let url = origin.url("/bare");

    assert_eq!(proxy.get(&url, &origin.host()).await, raw);
    assert_eq!(proxy.get(&url, &origin.host()).await, raw);
    assert_eq!(origin.requests("/bare"), 1);

    let entry = proxy.cache.lock().await.get(&url).unwrap();
    assert_eq!(entry.declared_content_length(), None);
    assert_eq!(entry.size(), raw.len() as u64);

    proxy.stop().await.unwrap();
}

// == Eviction ==

#[tokio::test]
async fn test_lru_eviction_end_to_end() {
    let body = [b'z'; 300];
    let origin = FakeOrigin::start(vec![
        ("/a", http_response(200, &body)),
        ("/b", http_response(200, &body)),
        ("/c", http_response(200, &body)),
    ])
    .await;
    let size = origin.response("/a").len() as u64;
    // Room for two responses, not three.
    let proxy = RunningProxy::start(size * 2 + size / 2).await;
    let (a, b, c) = (origin.url("/a"), origin.url("/b"), origin.url("/c"));
    let host = origin.host();

    proxy.get(&a, &host).await;
    proxy.get(&b, &host).await;
    assert_eq!(proxy.order().await, [b.clone(), a.clone()]);

    proxy.get(&c, &host).await;
    assert_eq!(proxy.order().await, [c.clone(), b.clone()]);
    assert_eq!(proxy.cache.lock().await.used_bytes(), size * 2);

    proxy.get(&b, &host).await;
    assert_eq!(proxy.order().await, [b.clone(), c.clone()]);
    assert_eq!(origin.requests("/b"), 1);

    // A was evicted, so it is fetched again and evicts C.
    proxy.get(&a, &host).await;
    assert_eq!(origin.requests("/a"), 2);
    assert_eq!(proxy.order().await, [a.clone(), b.clone()]);

    proxy.stop().await.unwrap();
}

// == Failures ==

#[tokio::test]
async fn test_unreachable_origin_returns_bad_gateway_and_proxy_survives() {
    let closed_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let origin = FakeOrigin::start(vec![("/ok", http_response(200, b"fine"))]).await;
    let proxy = RunningProxy::start(10_000).await;

    let dead_host = format!("127.0.0.1:{closed_port}");
    let response = proxy
        .get(&format!("http://{dead_host}/x"), &dead_host)
        .await;
    assert!(response.starts_with(b"HTTP/1.1 502 Bad Gateway\r\n"));
    assert!(proxy.cache.lock().await.is_empty());

    let response = proxy.get(&origin.url("/ok"), &origin.host()).await;
    assert_eq!(response, origin.response("/ok"));

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn test_missing_host_header_returns_bad_request() {
    let proxy = RunningProxy::start(10_000).await;

    let response = proxy
        .send(b"GET http://example.test/ HTTP/1.1\r\nAccept: */*\r\n\r\n")
        .await;

    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_closing_immediately_is_harmless() {
    let origin = FakeOrigin::start(vec![("/ok", http_response(200, b"fine"))]).await;
    let proxy = RunningProxy::start(10_000).await;

    drop(TcpStream::connect(proxy.addr).await.unwrap());

    let response = proxy.get(&origin.url("/ok"), &origin.host()).await;
    assert_eq!(response, origin.response("/ok"));
    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn test_oversized_response_is_served_then_stops_proxy() {
    let origin = FakeOrigin::start(vec![("/huge", http_response(200, &[b'#'; 500]))]).await;
    let proxy = RunningProxy::start(100).await;

    let response = proxy.get(&origin.url("/huge"), &origin.host()).await;
    assert_eq!(response, origin.response("/huge"));

    let outcome = proxy.handle.await.unwrap();
    assert!(matches!(
        outcome,
        Err(ProxyError::OversizedEntry { capacity: 100, .. })
    ));
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_share_cache() {
    let paths = ["/p0", "/p1", "/p2", "/p3"];
    let origin = Arc::new(
        FakeOrigin::start(
            paths
                .iter()
                .map(|p| (*p, http_response(200, p.repeat(50).as_bytes())))
                .collect(),
        )
        .await,
    );
    let proxy = Arc::new(RunningProxy::start(100_000).await);

    let mut clients = Vec::new();
    for i in 0..32 {
        let (origin, proxy) = (origin.clone(), proxy.clone());
        let path = paths[i % paths.len()];
        clients.push(tokio::spawn(async move {
            let response = proxy.get(&origin.url(path), &origin.host()).await;
            assert_eq!(response, origin.response(path));
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    let cache = proxy.cache.lock().await;
    assert_eq!(cache.len(), paths.len());
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 32);
    let expected_bytes: u64 = paths
        .iter()
        .map(|p| origin.response(p).len() as u64)
        .sum();
    assert_eq!(cache.used_bytes(), expected_bytes);
}

// == Real Client ==

#[tokio::test]
async fn test_reqwest_through_proxy() {
    let origin = FakeOrigin::start(vec![("/api/item?id=3", http_response(200, b"{\"id\":3}"))]).await;
    let proxy = RunningProxy::start(10_000).await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy.addr)).unwrap())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();

    for _ in 0..2 {
        let response = client
            .get(origin.url("/api/item?id=3"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "{\"id\":3}");
    }

    assert_eq!(origin.requests("/api/item?id=3"), 1);
    proxy.stop().await.unwrap();
}
