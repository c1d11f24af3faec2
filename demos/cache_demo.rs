/// Cache store demonstration - shows admission, eviction, and promotion
/// against the real `CacheStore` used by the proxy.
///
/// Run with: cargo run --example cache_demo
use bytes::Bytes;
use cacheproxy::cache::{CacheStore, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_OBJECT_SIZE};

#[tokio::main]
async fn main() {
    println!("Cache Store Demonstration");
    println!("=========================");

    println!("\nConfiguration:");
    println!("  Default max cache size: {DEFAULT_MAX_CACHE_SIZE} bytes");
    println!("  Default max object size: {DEFAULT_MAX_OBJECT_SIZE} bytes");

    let store = CacheStore::new(30, 10);

    println!("\nAdmitting three 10-byte entries against a 30-byte budget:");
    for (key, body) in [
        ("http://a.test/1", "aaaaaaaaaa"),
        ("http://b.test/1", "bbbbbbbbbb"),
        ("http://c.test/1", "cccccccccc"),
    ] {
        store
            .admit(Bytes::copy_from_slice(key.as_bytes()), Bytes::from_static(body.as_bytes()))
            .await;
        println!(
            "  admitted {key} -> used={}/{}",
            store.used().await,
            store.capacity()
        );
    }

    println!("\nAdmitting a fourth entry evicts the least-recently-used one:");
    store
        .admit(
            Bytes::copy_from_slice(b"http://d.test/1"),
            Bytes::from_static(b"dddddddddd"),
        )
        .await;
    for key in ["http://a.test/1", "http://b.test/1", "http://c.test/1", "http://d.test/1"] {
        let hit = store.lookup(key.as_bytes()).await.is_some();
        println!("  {key}: {}", if hit { "hit" } else { "miss" });
    }

    println!("\nOversize admission is a silent no-op:");
    let oversized = Bytes::from(vec![0u8; DEFAULT_MAX_OBJECT_SIZE + 1]);
    let store = CacheStore::new(DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_OBJECT_SIZE);
    let admitted = store
        .admit(Bytes::copy_from_slice(b"http://big.test/1"), oversized)
        .await;
    println!("  admitted={admitted}, len={}", store.len().await);

    store.shutdown().await;
    println!("\nShut down: len={}, used={}", store.len().await, store.used().await);
}
