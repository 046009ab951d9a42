//! Browser automation errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("invalid URL {0:?}")]
    InvalidUrl(String),

    /// The WebDriver endpoint could not be reached or the request failed in transit.
    #[error("WebDriver request {method} {url} failed")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: curl::Error,
    },

    /// The driver answered with an error object.
    #[error("WebDriver error {error}: {message}")]
    Driver { error: String, message: String },

    /// Non-JSON or unexpected reply.
    #[error("malformed WebDriver reply (HTTP {status}): {detail}")]
    Protocol { status: u32, detail: String },

    #[error("browser session already closed")]
    Closed,
}
