use std::process::ExitCode;
use std::sync::Arc;

use cacheproxy::cache::{CacheStore, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_OBJECT_SIZE};
use cacheproxy::worker::handle_connection;
use cacheproxy::MAX_CONNECTIONS;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// HTTP/1.0 forwarding proxy with a shared in-memory LRU response cache.
#[derive(Parser)]
#[command(name = "cacheproxy")]
struct Cli {
    /// TCP port to listen on.
    port: u16,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start tokio runtime")
        .block_on(run(cli.port));

    ExitCode::SUCCESS
}

async fn run(port: u16) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let max_cache_size = env_usize("CACHEPROXY_MAX_CACHE_SIZE", DEFAULT_MAX_CACHE_SIZE);
    let max_object_size = env_usize("CACHEPROXY_MAX_OBJECT_SIZE", DEFAULT_MAX_OBJECT_SIZE);

    info!(port, max_cache_size, max_object_size, "starting cacheproxy");

    let store = Arc::new(CacheStore::new(max_cache_size, max_object_size));
    let permits = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(l) => l,
        Err(e) => {
            error!(port, error = %e, "failed to bind listener");
            return;
        }
    };

    info!(port, "listening");

    let accept_loop = async {
        loop {
            let (stream, _addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };

            let store = store.clone();
            let permits = permits.clone();
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                handle_connection(stream, store).await;
            });
        }
    };

    tokio::select! {
        _ = accept_loop => {}
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    store.shutdown().await;
    info!("cache store shut down");
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
