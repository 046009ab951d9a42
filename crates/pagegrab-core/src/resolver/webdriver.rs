//! Synchronous WebDriver client over libcurl.
//!
//! Speaks just enough of the W3C protocol (with legacy JSON-wire fallbacks) to
//! create a session with a custom User-Agent, navigate, read the current URL
//! and delete the session. Works against chromedriver, geckodriver, Selenium
//! and PhantomJS/ghostdriver.

use std::time::Duration;

use curl::easy::{Easy, List};
use serde_json::{json, Value};

use super::{BrowserError, BrowserLauncher, BrowserSession};
use crate::config::BrowserConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Navigation blocks until the page load strategy is satisfied.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(180);

/// Opens sessions on a WebDriver endpoint such as `http://127.0.0.1:4444`.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    endpoint: String,
    browser: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(endpoint: &str, browser: &BrowserConfig) -> Result<Self, BrowserError> {
        let parsed = url::Url::parse(endpoint)
            .map_err(|_| BrowserError::InvalidUrl(endpoint.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BrowserError::InvalidUrl(endpoint.to_string()));
        }
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            browser: browser.name.clone(),
            headless: browser.headless,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// New-session body carrying `user_agent` in every dialect we know of.
    pub fn capabilities(&self, user_agent: &str) -> Value {
        let mut always = json!({ "browserName": self.browser });
        let mut desired = json!({
            "browserName": self.browser,
            "phantomjs.page.settings.userAgent": user_agent,
        });
        match self.browser.as_str() {
            "chrome" | "chromium" | "MicrosoftEdge" => {
                let mut args = vec![format!("--user-agent={}", user_agent)];
                if self.headless {
                    args.push("--headless=new".to_string());
                }
                let key = if self.browser == "MicrosoftEdge" {
                    "ms:edgeOptions"
                } else {
                    "goog:chromeOptions"
                };
                always[key] = json!({ "args": args });
                desired[key] = json!({ "args": args });
            }
            "firefox" => {
                let mut opts = json!({
                    "prefs": { "general.useragent.override": user_agent },
                });
                if self.headless {
                    opts["args"] = json!(["-headless"]);
                }
                always["moz:firefoxOptions"] = opts.clone();
                desired["moz:firefoxOptions"] = opts;
            }
            _ => {}
        }
        json!({
            "capabilities": { "alwaysMatch": always },
            "desiredCapabilities": desired,
        })
    }
}

impl BrowserLauncher for WebDriverLauncher {
    fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let url = format!("{}/session", self.endpoint);
        let reply = command(Method::Post, &url, Some(&self.capabilities(user_agent)))?;
        let id = session_id(&reply)?;
        tracing::info!(endpoint = %self.endpoint, session = %id, browser = %self.browser, "browser session created");
        Ok(Box::new(WebDriverSession {
            base: format!("{}/session/{}", self.endpoint, id),
            id,
            closed: false,
        }))
    }
}

/// A live WebDriver session. Deleted on `close` or, failing that, on drop.
#[derive(Debug)]
pub struct WebDriverSession {
    base: String,
    id: String,
    closed: bool,
}

impl WebDriverSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }
}

impl BrowserSession for WebDriverSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        tracing::debug!(session = %self.id, url, "navigate");
        command(
            Method::Post,
            &format!("{}/url", self.base),
            Some(&json!({ "url": url })),
        )?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<Option<String>, BrowserError> {
        self.ensure_open()?;
        let reply = command(Method::Get, &format!("{}/url", self.base), None)?;
        Ok(reply
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        command(Method::Delete, &self.base, None)?;
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(session = %self.id, "deleting WebDriver session failed: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Sends one command and returns the decoded reply, mapping error objects to
/// `BrowserError::Driver`.
fn command(method: Method, url: &str, body: Option<&Value>) -> Result<Value, BrowserError> {
    let transport = |source| BrowserError::Transport {
        method: method.as_str(),
        url: url.to_string(),
        source,
    };
    let mut response = Vec::new();

    let mut easy = Easy::new();
    easy.url(url).map_err(transport)?;
    easy.connect_timeout(CONNECT_TIMEOUT).map_err(transport)?;
    easy.timeout(COMMAND_TIMEOUT).map_err(transport)?;
    let mut headers = List::new();
    headers
        .append("Accept: application/json")
        .map_err(transport)?;
    match method {
        Method::Get => {}
        Method::Post => {
            let payload = body.cloned().unwrap_or_else(|| json!({})).to_string();
            headers
                .append("Content-Type: application/json; charset=utf-8")
                .map_err(transport)?;
            headers.append("Expect:").map_err(transport)?;
            easy.post(true).map_err(transport)?;
            easy.post_fields_copy(payload.as_bytes())
                .map_err(transport)?;
        }
        Method::Delete => easy.custom_request("DELETE").map_err(transport)?,
    }
    easy.http_headers(headers).map_err(transport)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                response.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(transport)?;
        transfer.perform().map_err(transport)?;
    }
    let status = easy.response_code().map_err(transport)?;
    decode_reply(status, &response)
}

fn decode_reply(status: u32, body: &[u8]) -> Result<Value, BrowserError> {
    let reply: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|e| BrowserError::Protocol {
            status,
            detail: e.to_string(),
        })?
    };

    if let Some(err) = reply
        .get("value")
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
    {
        let message = reply["value"]
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(BrowserError::Driver {
            error: err.to_string(),
            message: message.to_string(),
        });
    }
    // legacy JSON-wire: non-zero "status" means failure
    if let Some(code) = reply
        .get("status")
        .and_then(Value::as_i64)
        .filter(|c| *c != 0)
    {
        let message = reply
            .get("value")
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(BrowserError::Driver {
            error: format!("status {}", code),
            message: message.to_string(),
        });
    }
    if !(200..300).contains(&status) {
        return Err(BrowserError::Protocol {
            status,
            detail: reply.to_string(),
        });
    }
    Ok(reply)
}

/// Session id from a W3C (`value.sessionId`) or legacy (`sessionId`) reply.
fn session_id(reply: &Value) -> Result<String, BrowserError> {
    reply
        .get("value")
        .and_then(|v| v.get("sessionId"))
        .or_else(|| reply.get("sessionId"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol {
            status: 200,
            detail: format!("no sessionId in {}", reply),
        })
}
