//! Minimal HTTP/1.1 server for transfer tests.
//!
//! Serves one static body at every path except `/redirect` (302 to `/file.bin`)
//! and `/missing` (404). Honors `Range: bytes=N-` with 206 / 416 and records
//! every request so tests can assert what was fetched.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit Content-Length and delimit the body by closing.
    pub send_length: bool,
    /// Cut the first body response after this many bytes (simulates a dropped connection).
    pub truncate_first_at: Option<usize>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            send_length: true,
            truncate_first_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub path: String,
    /// Start of `Range: bytes=N-`, if sent.
    pub range_start: Option<u64>,
    pub user_agent: Option<String>,
}

pub struct RangeServer {
    base: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl RangeServer {
    /// `http://127.0.0.1:PORT/<path>`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

/// Starts a server in a background thread serving `body`. Runs until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}/", port);
    let body = Arc::new(body);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let truncated = Arc::new(AtomicBool::new(false));
    let seen_srv = Arc::clone(&seen);
    let base_srv = base.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let seen = Arc::clone(&seen_srv);
            let truncated = Arc::clone(&truncated);
            let base = base_srv.clone();
            thread::spawn(move || handle(stream, &body, opts, &seen, &truncated, &base));
        }
    });
    RangeServer { base, seen }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: RangeServerOptions,
    seen: &Mutex<Vec<SeenRequest>>,
    truncated: &AtomicBool,
    base: &str,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let req = parse_request(&head);
    seen.lock().unwrap().push(req.clone());
    let total = body.len() as u64;

    if req.path == "/redirect" {
        let response = format!(
            "HTTP/1.1 302 Found\r\nLocation: {}file.bin\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            base
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if req.path == "/missing" {
        let msg = b"not found";
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            msg.len()
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(msg);
        return;
    }

    let (status, content_range, slice) = match req.range_start {
        Some(start) if opts.support_ranges => {
            if start >= total {
                (
                    "416 Range Not Satisfiable",
                    Some(format!("bytes */{}", total)),
                    &body[0..0],
                )
            } else {
                (
                    "206 Partial Content",
                    Some(format!("bytes {}-{}/{}", start, total - 1, total)),
                    &body[start as usize..],
                )
            }
        }
        _ => ("200 OK", None, body),
    };

    let mut response = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    if opts.send_length {
        response.push_str(&format!("Content-Length: {}\r\n", slice.len()));
    }
    if let Some(cr) = content_range {
        response.push_str(&format!("Content-Range: {}\r\n", cr));
    }
    if opts.support_ranges {
        response.push_str("Accept-Ranges: bytes\r\n");
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());

    let cut = match opts.truncate_first_at {
        Some(n) if !slice.is_empty() && !truncated.swap(true, Ordering::SeqCst) => {
            n.min(slice.len())
        }
        _ => slice.len(),
    };
    let _ = stream.write_all(&slice[..cut]);
    let _ = stream.flush();
}

/// Reads up to the blank line ending the request head.
fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if buf.len() > 64 * 1024 {
            break;
        }
    }
    if buf.is_empty() {
        return None;
    }
    String::from_utf8(buf).ok()
}

fn parse_request(head: &str) -> SeenRequest {
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let mut range_start = None;
    let mut user_agent = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("range") {
                range_start = value
                    .strip_prefix("bytes=")
                    .and_then(|v| v.split('-').next())
                    .and_then(|v| v.trim().parse::<u64>().ok());
            } else if name.eq_ignore_ascii_case("user-agent") {
                user_agent = Some(value.to_string());
            }
        }
    }
    SeenRequest {
        path,
        range_start,
        user_agent,
    }
}
