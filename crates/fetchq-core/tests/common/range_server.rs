//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a fixed set of bodies by path. Counts requests, tracks how many GETs
//! run at once and can inject faults (503s, truncated bodies, ignored ranges,
//! slow bodies, misaligned ranges).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even if ranges work. Independent of
    /// `support_ranges`, so a server can advertise ranges and then ignore them.
    pub advertise_ranges: bool,
    /// The first N GETs of each path answer 503.
    pub fail_first_gets: usize,
    /// The first N GETs of each path send half the body and close.
    pub truncate_first_gets: usize,
    /// Sleep between headers and body.
    pub body_delay: Duration,
    /// Send the body in 4 KiB chunks with this pause between them.
    pub chunk_delay: Duration,
    /// If false, HEAD omits Content-Length.
    pub head_content_length: bool,
    /// Answer every satisfiable Range GET with a 206 starting at this offset,
    /// whatever offset was asked for.
    pub range_start_override: Option<u64>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            fail_first_gets: 0,
            truncate_first_gets: 0,
            body_delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            head_content_length: true,
            range_start_override: None,
        }
    }
}

#[derive(Default)]
struct ServerState {
    gets: Mutex<HashMap<String, usize>>,
    ranged_gets: AtomicUsize,
    heads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Handle to a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    base: String,
    state: Arc<ServerState>,
}

impl RangeServer {
    /// URL for `path` (e.g. "a.bin").
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// GETs received for `path`, including failed ones.
    pub fn get_count(&self, path: &str) -> usize {
        let key = format!("/{}", path.trim_start_matches('/'));
        self.state.gets.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    pub fn total_gets(&self) -> usize {
        self.state.gets.lock().unwrap().values().sum()
    }

    /// GETs that carried a Range header.
    pub fn ranged_gets(&self) -> usize {
        self.state.ranged_gets.load(Ordering::SeqCst)
    }

    pub fn head_count(&self) -> usize {
        self.state.heads.load(Ordering::SeqCst)
    }

    /// Highest number of GET bodies served at the same time.
    pub fn max_concurrent_gets(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Serve a single body at `/file.bin`.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(vec![("file.bin".to_string(), body)], RangeServerOptions::default())
}

/// Serve `bodies` (path, content) with custom behavior.
pub fn start_with_options(bodies: Vec<(String, Vec<u8>)>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let bodies: Arc<HashMap<String, Vec<u8>>> = Arc::new(
        bodies
            .into_iter()
            .map(|(p, b)| (format!("/{}", p.trim_start_matches('/')), b))
            .collect(),
    );
    let state = Arc::new(ServerState::default());
    let server_state = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let bodies = Arc::clone(&bodies);
            let state = Arc::clone(&server_state);
            thread::spawn(move || handle(stream, &bodies, &state, opts));
        }
    });
    RangeServer {
        base: format!("http://127.0.0.1:{}/", port),
        state,
    }
}

struct InFlight<'a>(&'a ServerState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a ServerState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn handle(
    mut stream: TcpStream,
    bodies: &HashMap<String, Vec<u8>>,
    state: &ServerState,
    opts: RangeServerOptions,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, path, range) = parse_request(request);
    let Some(body) = bodies.get(path) else {
        let _ = stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    };
    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method.eq_ignore_ascii_case("HEAD") {
        state.heads.fetch_add(1, Ordering::SeqCst);
        if !opts.head_allowed {
            let _ = stream.write_all(
                b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            return;
        }
        let length = if opts.head_content_length {
            format!("Content-Length: {}\r\n", total)
        } else {
            String::new()
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\n{}{}Connection: close\r\n\r\n",
            length, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let nth = {
        let mut gets = state.gets.lock().unwrap();
        let count = gets.entry(path.to_string()).or_insert(0);
        *count += 1;
        *count
    };
    if range.is_some() {
        state.ranged_gets.fetch_add(1, Ordering::SeqCst);
    }
    let _in_flight = InFlight::enter(state);

    if nth <= opts.fail_first_gets {
        let _ = stream.write_all(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
        );
        return;
    }

    let (status, content_range, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start >= total || start > end_incl {
                ("416 Range Not Satisfiable", format!("bytes */{}", total), &body[0..0])
            } else {
                let start = opts.range_start_override.unwrap_or(start).min(end_incl);
                let slice = &body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content",
                    format!("bytes {}-{}/{}", start, end_incl, total),
                    slice,
                )
            }
        }
        None => ("200 OK", String::new(), &body[..]),
    };
    let content_range = if content_range.is_empty() {
        String::new()
    } else {
        format!("Content-Range: {}\r\n", content_range)
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}{}Connection: close\r\n\r\n",
        status,
        slice.len(),
        content_range,
        accept_ranges
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    if !opts.body_delay.is_zero() {
        thread::sleep(opts.body_delay);
    }

    let truncate = nth <= opts.fail_first_gets + opts.truncate_first_gets;
    let to_send = if truncate { &slice[..slice.len() / 2] } else { slice };
    if opts.chunk_delay.is_zero() {
        let _ = stream.write_all(to_send);
    } else {
        for chunk in to_send.chunks(4096) {
            if stream.write_all(chunk).is_err() {
                return;
            }
            let _ = stream.flush();
            thread::sleep(opts.chunk_delay);
        }
    }
    let _ = stream.flush();
    if truncate {
        let _ = stream.shutdown(Shutdown::Both);
    }
}

/// Returns (method, path, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut method = "";
    let mut path = "/";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            let mut parts = line.split_whitespace();
            method = parts.next().unwrap_or("");
            path = parts.next().unwrap_or("/");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if value.to_lowercase().starts_with("bytes=") {
                    let part = value[6..].trim();
                    if let Some((a, b)) = part.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, path, range)
}
