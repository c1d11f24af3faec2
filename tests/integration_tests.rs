//! End-to-end proxy tests: a real `TcpListener` acting as the proxy's
//! front door, a throwaway `TcpListener` on loopback acting as the
//! origin, driven through `cacheproxy::worker::handle_connection`.
use std::sync::Arc;
use std::time::Duration;

use cacheproxy::cache::CacheStore;
use cacheproxy::worker::handle_connection;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

async fn spawn_origin_once(response: &'static [u8]) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            // Drain the request the proxy forwards.
            let _ = timeout(Duration::from_secs(1), stream.read(&mut buf)).await;
            let _ = stream.write_all(response).await;
        }
    });
    addr
}

async fn spawn_proxy(store: Arc<CacheStore>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let store = store.clone();
            tokio::spawn(handle_connection(stream, store));
        }
    });
    addr
}

async fn send_request(proxy_addr: std::net::SocketAddr, request: &str) -> Vec<u8> {
    let mut conn = TcpStream::connect(proxy_addr).await.unwrap();
    conn.write_all(request.as_bytes()).await.unwrap();
    conn.shutdown().await.unwrap_or(());

    let mut out = Vec::new();
    let _ = timeout(Duration::from_secs(2), conn.read_to_end(&mut out)).await;
    out
}

#[tokio::test]
async fn miss_then_hit_round_trips_byte_identical_response() {
    let origin_response = b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nhello";
    let origin_addr = spawn_origin_once(origin_response).await;

    let store = Arc::new(CacheStore::new(1_049_000, 102_400));
    let proxy_addr = spawn_proxy(store).await;

    let target = format!("http://127.0.0.1:{}/p", origin_addr.port());
    let request = format!("GET {target} HTTP/1.0\r\nHost: x\r\n\r\n");

    let first = send_request(proxy_addr, &request).await;
    assert_eq!(first, origin_response);

    // Second request for the same URL must not touch the origin (there
    // is no second origin listener; a miss here would hang and time out).
    let second = send_request(proxy_addr, &request).await;
    assert_eq!(second, origin_response);
}

#[tokio::test]
async fn non_get_method_is_rejected_with_501() {
    let store = Arc::new(CacheStore::new(1_049_000, 102_400));
    let proxy_addr = spawn_proxy(store).await;

    let request = "POST http://example.com/p HTTP/1.0\r\nHost: x\r\n\r\n";
    let response = send_request(proxy_addr, request).await;
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.0 501"), "got: {text}");
}

#[tokio::test]
async fn oversize_response_is_forwarded_but_not_cached() {
    let big_body = vec![b'x'; 200];
    let mut origin_response = b"HTTP/1.0 200 OK\r\nContent-Length: 200\r\n\r\n".to_vec();
    origin_response.extend_from_slice(&big_body);
    let origin_response: &'static [u8] = Box::leak(origin_response.into_boxed_slice());

    let origin_addr = spawn_origin_once(origin_response).await;
    // max_object smaller than the response forces the no-admission path.
    let store = Arc::new(CacheStore::new(1024, 64));
    let proxy_addr = spawn_proxy(store.clone()).await;

    let target = format!("http://127.0.0.1:{}/big", origin_addr.port());
    let request = format!("GET {target} HTTP/1.0\r\nHost: x\r\n\r\n");

    let response = send_request(proxy_addr, &request).await;
    assert_eq!(response, origin_response);
    assert_eq!(store.lookup(target.as_bytes()).await, None);
}

#[tokio::test]
async fn malformed_request_line_is_rejected() {
    let store = Arc::new(CacheStore::new(1_049_000, 102_400));
    let proxy_addr = spawn_proxy(store).await;

    let response = send_request(proxy_addr, "garbage\r\n\r\n").await;
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.0 400") || text.is_empty(), "got: {text}");
}
