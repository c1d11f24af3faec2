//! Per-connection request handling: read a request line, consult the
//! Cache Store, replay a hit or perform an origin round-trip, and offer
//! the response to the Cache Store on success.
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::target::parse_target;

/// Request line and headers larger than this are a client protocol
/// error rather than an unbounded read.
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";
const ORIGIN_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// The three error kinds from spec.md §7, carried only far enough to
/// pick the right client-facing response (or none) and log level.
enum WorkerError {
    /// Unsupported method or malformed request line — answered with an
    /// HTTP error page before closing.
    ClientProtocol { status: u16, reason: &'static str },
    /// Origin unreachable, read/write failure, client disconnect —
    /// logged, no response is attempted (the client may already be gone).
    Transport(String),
}

/// Drives one client connection to completion. Never propagates errors
/// to the caller: all failures are handled by answering the client (when
/// still possible) and returning.
pub async fn handle_connection(client: TcpStream, store: Arc<CacheStore>) {
    let peer = client.peer_addr().ok();
    let mut client = BufReader::new(client);

    match run(&mut client, &store).await {
        Ok(()) => {}
        Err(WorkerError::ClientProtocol { status, reason }) => {
            warn!(?peer, status, reason, "client protocol error");
            let _ = write_error_page(client.get_mut(), status, reason).await;
        }
        Err(WorkerError::Transport(detail)) => {
            warn!(?peer, detail, "transport failure");
        }
    }
}

async fn run(client: &mut BufReader<TcpStream>, store: &Arc<CacheStore>) -> Result<(), WorkerError> {
    let request_line = read_line_bounded(client).await?;
    if request_line.is_empty() {
        // EOF before a full line arrived.
        return Ok(());
    }

    let (method, request_target, _version) = parse_request_line(&request_line)?;

    if !method.eq_ignore_ascii_case("GET") {
        // Still drain headers so the connection can be closed cleanly,
        // then report the error.
        drain_headers(client).await?;
        return Err(WorkerError::ClientProtocol {
            status: 501,
            reason: "Not Implemented",
        });
    }

    let client_headers = read_headers(client).await?;

    if let Some(cached) = store.lookup(request_target.as_bytes()).await {
        debug!(%request_target, "cache hit");
        client
            .get_mut()
            .write_all(&cached)
            .await
            .map_err(|e| WorkerError::Transport(e.to_string()))?;
        return Ok(());
    }
    debug!(%request_target, "cache miss");

    let parsed = parse_target(&request_target);

    let mut origin = timeout(
        ORIGIN_CONNECT_TIMEOUT,
        TcpStream::connect((parsed.host.as_str(), parsed.port.unwrap_or(80))),
    )
    .await
    .map_err(|_| WorkerError::Transport("origin connect timed out".into()))?
    .map_err(|e| WorkerError::Transport(format!("origin connect failed: {e}")))?;

    let request = build_origin_request(&parsed, &client_headers);
    timeout(IO_TIMEOUT, origin.write_all(request.as_bytes()))
        .await
        .map_err(|_| WorkerError::Transport("origin write timed out".into()))?
        .map_err(|e| WorkerError::Transport(format!("origin write failed: {e}")))?;

    relay_response(client.get_mut(), &mut origin, store, request_target).await
}

/// Reads a single `\r\n`-terminated line, bounded by `MAX_REQUEST_SIZE`.
/// Returns an empty string on clean EOF.
async fn read_line_bounded(client: &mut BufReader<TcpStream>) -> Result<String, WorkerError> {
    let mut line = String::new();
    let n = timeout(IO_TIMEOUT, client.read_line(&mut line))
        .await
        .map_err(|_| WorkerError::Transport("client read timed out".into()))?
        .map_err(|e| WorkerError::Transport(format!("client read failed: {e}")))?;

    if n == 0 {
        return Ok(String::new());
    }
    if line.len() > MAX_REQUEST_SIZE {
        return Err(WorkerError::ClientProtocol {
            status: 400,
            reason: "Bad Request",
        });
    }
    Ok(line)
}

fn parse_request_line(line: &str) -> Result<(String, String, String), WorkerError> {
    let mut parts = line.trim_end_matches(['\r', '\n']).splitn(3, ' ');
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let version = parts.next().unwrap_or("");

    if method.is_empty() || target.is_empty() {
        return Err(WorkerError::ClientProtocol {
            status: 400,
            reason: "Bad Request",
        });
    }

    Ok((method.to_string(), target.to_string(), version.to_string()))
}

/// Reads headers up to the terminating blank line, returning them
/// verbatim (each including its trailing `\r\n`) for the caller to
/// filter. Bounded by `MAX_REQUEST_SIZE` in total.
async fn read_headers(client: &mut BufReader<TcpStream>) -> Result<Vec<String>, WorkerError> {
    let mut headers = Vec::new();
    let mut total = 0usize;
    loop {
        let line = read_line_bounded(client).await?;
        if line.is_empty() || line == "\r\n" || line == "\n" {
            break;
        }
        total += line.len();
        if total > MAX_REQUEST_SIZE {
            return Err(WorkerError::ClientProtocol {
                status: 400,
                reason: "Bad Request",
            });
        }
        headers.push(line);
    }
    Ok(headers)
}

async fn drain_headers(client: &mut BufReader<TcpStream>) -> Result<(), WorkerError> {
    read_headers(client).await.map(|_| ())
}

fn build_origin_request(target: &crate::target::Target, client_headers: &[String]) -> String {
    let mut req = format!("GET {} HTTP/1.0\r\n", target.path);

    match target.port {
        Some(port) => req.push_str(&format!("Host: {}:{}\r\n", target.host, port)),
        None => req.push_str(&format!("Host: {}\r\n", target.host)),
    }
    req.push_str(&format!("User-Agent: {USER_AGENT}\r\n"));
    req.push_str("Connection: close\r\n");
    req.push_str("Proxy-Connection: close\r\n");

    for header in client_headers {
        let lower = header.to_ascii_lowercase();
        if lower.starts_with("host:")
            || lower.starts_with("user-agent:")
            || lower.starts_with("connection:")
            || lower.starts_with("proxy-connection:")
        {
            continue;
        }
        req.push_str(header);
        if !header.ends_with("\r\n") {
            req.push_str("\r\n");
        }
    }
    req.push_str("\r\n");
    req
}

/// Relays the origin's response to the client verbatim, staging a copy
/// capped at `max_object + 1` bytes. Admission is attempted only if the
/// full response fit within that cap.
async fn relay_response(
    client: &mut TcpStream,
    origin: &mut TcpStream,
    store: &Arc<CacheStore>,
    request_target: String,
) -> Result<(), WorkerError> {
    let max_object = store.max_object();
    let mut staging = BytesMut::with_capacity(max_object.min(64 * 1024));
    let mut overflowed = false;
    let mut buf = [0u8; 8192];

    loop {
        let n = timeout(IO_TIMEOUT, origin.read(&mut buf))
            .await
            .map_err(|_| WorkerError::Transport("origin read timed out".into()))?
            .map_err(|e| WorkerError::Transport(format!("origin read failed: {e}")))?;
        if n == 0 {
            break;
        }

        client
            .write_all(&buf[..n])
            .await
            .map_err(|e| WorkerError::Transport(format!("client write failed: {e}")))?;

        if !overflowed {
            if staging.len() + n > max_object + 1 {
                overflowed = true;
                staging.clear();
            } else {
                staging.extend_from_slice(&buf[..n]);
            }
        }
    }

    if !overflowed && !staging.is_empty() {
        if crate::memory::has_sufficient_memory() {
            let admitted = store
                .admit(Bytes::from(request_target.clone().into_bytes()), staging.freeze())
                .await;
            if admitted {
                info!(%request_target, "admitted to cache");
            }
        } else {
            debug!(%request_target, "skipped admission: memory pressure");
        }
    }

    Ok(())
}

async fn write_error_page(
    client: &mut TcpStream,
    status: u16,
    reason: &str,
) -> std::io::Result<()> {
    let body = format!(
        "<html><title>Proxy Error</title><body bgcolor=\"ffffff\">\r\n\
         {status}: {reason}\r\n\
         <hr><em>The cacheproxy proxy</em>\r\n</body></html>\r\n"
    );
    let response = format!(
        "HTTP/1.0 {status} {reason}\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\r\n{body}",
        body.len()
    );
    client.write_all(response.as_bytes()).await
}
