/// Full proxy server example - runs the real accept loop and worker
/// against the real `CacheStore`, the same code path `main.rs` uses.
///
/// Run with: cargo run --example full_proxy
/// Test with: curl -x localhost:8888 http://httpbin.org/get
use cacheproxy::cache::{CacheStore, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_OBJECT_SIZE};
use cacheproxy::worker::handle_connection;
use std::sync::Arc;
use tokio::net::TcpListener;

const PROXY_PORT: u16 = 8888;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("cacheproxy=info,full_proxy=info")
        .init();

    println!("cacheproxy full proxy example");
    println!("Starting on port {PROXY_PORT}");
    println!("Test with: curl -x localhost:{PROXY_PORT} http://example.com");

    let store = Arc::new(CacheStore::new(DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_OBJECT_SIZE));
    let listener = TcpListener::bind(("127.0.0.1", PROXY_PORT))
        .await
        .expect("failed to bind port");

    println!("Listening on localhost:{PROXY_PORT}. Press Ctrl+C to stop.");

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                eprintln!("accept failed: {e}");
                continue;
            }
        };

        let store = store.clone();
        tokio::spawn(async move {
            println!("connection from {addr}");
            handle_connection(stream, store).await;
        });
    }
}
