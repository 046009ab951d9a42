//! pagegrab core: resolve the real content URL behind a page with a browser,
//! then download it resumably and commit it atomically.

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod resolver;
pub mod transfer;
pub mod user_agent;

pub use error::GrabError;
pub use orchestrator::{Downloader, GrabRequest, Quiet, RunReporter};
pub use progress::{NoProgress, ProgressSink};
