//! HTTP/1.0 forwarding proxy with a shared in-memory LRU response cache.
//!
//! [`cache::CacheStore`] is the core: a fixed-capacity, concurrently
//! accessed, approximately-LRU store. [`worker::handle_connection`]
//! drives one client connection against it. `main.rs` wires the
//! accept loop and signal handling around both.
pub mod cache;
pub mod memory;
pub mod target;
pub mod worker;

pub use cache::{CacheStore, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_OBJECT_SIZE};
pub use target::{parse_target, Target};
pub use worker::{handle_connection, MAX_REQUEST_SIZE};

/// Maximum number of simultaneously in-flight worker tasks. This bounds
/// fan-out width only; it does not serialize workers — a connection
/// beyond the cap waits on a semaphore permit, which is released the
/// instant any other worker finishes, not in lockstep with the acceptor.
pub const MAX_CONNECTIONS: usize = 512;
