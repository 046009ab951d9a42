//! In-process WebDriver endpoint.
//!
//! Understands new session, navigate, get current URL and delete session.
//! Navigation "lands" on `redirect_to` when set, otherwise on the URL given.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

pub const SESSION_ID: &str = "stub-session-1";

#[derive(Debug, Clone, Default)]
pub struct StubOptions {
    pub redirect_to: Option<String>,
    /// Reply to new-session with this W3C error code.
    pub refuse_session: Option<&'static str>,
}

#[derive(Debug, Default)]
pub struct StubState {
    pub new_session_bodies: Vec<Value>,
    pub navigated: Vec<String>,
    pub deleted: Vec<String>,
    location: Option<String>,
}

pub struct WebDriverStub {
    endpoint: String,
    state: Arc<Mutex<StubState>>,
}

impl WebDriverStub {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&StubState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }
}

pub fn start(opts: StubOptions) -> WebDriverStub {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let endpoint = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let state = Arc::new(Mutex::new(StubState::default()));
    let state_srv = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&state_srv);
            let opts = opts.clone();
            thread::spawn(move || handle(stream, &opts, &state));
        }
    });
    WebDriverStub { endpoint, state }
}

fn handle(mut stream: TcpStream, opts: &StubOptions, state: &Mutex<StubState>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let Some((method, path, body)) = read_request(&mut stream) else {
        return;
    };
    let session_base = format!("/session/{}", SESSION_ID);
    let (status, reply) = {
        let mut st = state.lock().unwrap();
        match (method.as_str(), path.as_str()) {
            ("POST", "/session") => {
                st.new_session_bodies.push(body);
                match opts.refuse_session {
                    Some(code) => (
                        "500 Internal Server Error",
                        json!({
                            "value": { "error": code, "message": "refused", "stacktrace": "" }
                        }),
                    ),
                    None => (
                        "200 OK",
                        json!({ "value": { "sessionId": SESSION_ID, "capabilities": {} } }),
                    ),
                }
            }
            ("POST", p) if p == format!("{}/url", session_base) => {
                let url = body["url"].as_str().unwrap_or_default().to_string();
                st.navigated.push(url.clone());
                st.location = Some(opts.redirect_to.clone().unwrap_or(url));
                ("200 OK", json!({ "value": null }))
            }
            ("GET", p) if p == format!("{}/url", session_base) => {
                let loc = st.location.clone().unwrap_or_else(|| "about:blank".to_string());
                ("200 OK", json!({ "value": loc }))
            }
            ("DELETE", p) if p == session_base => {
                st.deleted.push(SESSION_ID.to_string());
                ("200 OK", json!({ "value": null }))
            }
            _ => (
                "404 Not Found",
                json!({ "value": { "error": "unknown command", "message": path } }),
            ),
        }
    };
    let payload = reply.to_string();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn read_request(stream: &mut TcpStream) -> Option<(String, String, Value)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let raw = &buf[head_end..buf.len().min(head_end + length)];
    let body = serde_json::from_slice(raw).unwrap_or(Value::Null);
    Some((method, path, body))
}
