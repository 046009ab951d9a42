//! One libcurl handle for exactly one transfer.
//!
//! A `TransferSession` is built with every option applied from scratch and is
//! consumed by `run`, so cookies, callbacks and connection state never carry
//! over to the next request.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str;
use std::time::Duration;

use curl::easy::{Easy, InfoType};

use super::{TransferError, TransferOptions, TransferRequest};
use crate::progress::{PercentTracker, ProgressSink};

pub struct TransferSession {
    easy: Easy,
    url: String,
    dest: PathBuf,
    /// Non-zero resume offset, if any.
    resume: Option<u64>,
    verbose: bool,
    user_agent: String,
}

impl TransferSession {
    /// Fresh handle configured for `request`.
    pub fn open(
        options: &TransferOptions,
        request: &TransferRequest,
        user_agent: String,
    ) -> Result<Self, TransferError> {
        let resume = request.resume_offset.filter(|o| *o > 0);

        let mut easy = Easy::new();
        easy.url(&request.url)?;
        easy.ssl_verify_peer(true)?;
        easy.ssl_verify_host(true)?;
        easy.follow_location(true)?;
        // error bodies must never reach the temp file; libcurl still lets a
        // 416 through when resuming
        easy.fail_on_error(true)?;
        easy.autoreferer(true)?;
        easy.max_redirections(options.max_redirections)?;
        easy.useragent(&user_agent)?;
        easy.progress(true)?;
        easy.verbose(request.verbose)?;
        easy.connect_timeout(options.connect_timeout)?;
        easy.low_speed_limit(options.low_speed_limit)?;
        easy.low_speed_time(options.low_speed_time)?;
        if let Some(offset) = resume {
            easy.resume_from(offset)?;
        }

        Ok(Self {
            easy,
            url: request.url.clone(),
            dest: request.dest.clone(),
            resume,
            verbose: request.verbose,
            user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Runs the GET into the destination file and returns the bytes written
    /// by this session. Consumes the handle.
    pub fn run(mut self, sink: &mut dyn ProgressSink) -> Result<u64, TransferError> {
        let mut file = open_destination(&self.dest, self.resume)?;
        let resume = self.resume;
        let verbose = self.verbose;

        let written = Cell::new(0u64);
        let status = Cell::new(0u32);
        let content_range_total: Cell<Option<u64>> = Cell::new(None);
        let content_length: Cell<Option<u64>> = Cell::new(None);
        let range_ignored = Cell::new(false);
        let write_err: RefCell<Option<std::io::Error>> = RefCell::new(None);
        let mut tracker = PercentTracker::new();

        let performed = {
            let mut transfer = self.easy.transfer();
            transfer.header_function(|line| {
                let Ok(line) = str::from_utf8(line) else {
                    return true;
                };
                if let Some(code) = parse_status_line(line) {
                    // new response in a redirect chain
                    status.set(code);
                    content_range_total.set(None);
                    content_length.set(None);
                } else if let Some(total) = parse_content_range_total(line) {
                    content_range_total.set(Some(total));
                } else if let Some(len) = parse_content_length(line) {
                    content_length.set(Some(len));
                }
                true
            })?;
            transfer.write_function(|data| {
                if resume.is_some() && status.get() != 206 {
                    if status.get() == 200 {
                        range_ignored.set(true);
                        return Ok(0); // abort before appending a duplicate body
                    }
                    // only 206 bytes belong in a resumed file
                    return Ok(data.len());
                }
                match file.write_all(data) {
                    Ok(()) => {
                        written.set(written.get() + data.len() as u64);
                        Ok(data.len())
                    }
                    Err(e) => {
                        tracing::warn!("download write failed: {}", e);
                        *write_err.borrow_mut() = Some(e);
                        Ok(0)
                    }
                }
            })?;
            transfer.progress_function(|dltotal, dlnow, _ultotal, _ulnow| {
                tracker.forward(dltotal, dlnow, &mut *sink);
                true
            })?;
            if verbose {
                transfer.debug_function(trace_curl)?;
            }
            transfer.perform()
        };

        let clean = performed.is_ok();
        let code = match performed {
            Ok(()) => self.easy.response_code()?,
            Err(e) => {
                if let Some(source) = write_err.take() {
                    return Err(TransferError::Write {
                        path: self.dest.clone(),
                        source,
                    });
                }
                match resume {
                    // judged below from the headers libcurl rejected
                    Some(_) if range_ignored.get() || e.is_range_error() => status.get(),
                    _ if e.is_http_returned_error() => {
                        return Err(TransferError::Http(self.easy.response_code()?));
                    }
                    _ => return Err(TransferError::Curl(e)),
                }
            }
        };

        match resume {
            Some(offset) => {
                let complete = resume_outcome(
                    offset,
                    code,
                    clean,
                    content_range_total.get(),
                    content_length.get(),
                    written.get(),
                )?;
                if complete {
                    tracing::info!(url = %self.url, offset, "resume file already complete");
                }
            }
            None if !(200..300).contains(&code) => return Err(TransferError::Http(code)),
            None => {}
        }

        file.sync_all().map_err(|source| TransferError::Write {
            path: self.dest.clone(),
            source,
        })?;
        Ok(written.get())
    }
}

/// Decides a resumed transfer from its final status. `clean` is false when
/// libcurl itself rejected the reply. `Ok(true)` means the file was already
/// complete and nothing was fetched.
fn resume_outcome(
    offset: u64,
    code: u32,
    clean: bool,
    range_total: Option<u64>,
    length: Option<u64>,
    written: u64,
) -> Result<bool, TransferError> {
    match code {
        206 if clean => Ok(false),
        // range starts at EOF: the earlier run already got every byte
        416 if range_total == Some(offset) => Ok(true),
        200 if written == 0 && length == Some(offset) => Ok(true),
        206 | 416 => Err(TransferError::RangeRejected { offset }),
        200..=299 => Err(TransferError::RangeIgnored { offset }),
        _ => Err(TransferError::Http(code)),
    }
}

/// Fresh downloads truncate; resumes append and must start at exactly `offset`.
fn open_destination(path: &Path, resume: Option<u64>) -> Result<File, TransferError> {
    let opened = match resume {
        None => File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path),
        Some(_) => File::options().append(true).open(path),
    };
    let file = opened.map_err(|source| TransferError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(expected) = resume {
        let actual = file
            .metadata()
            .map_err(|source| TransferError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if actual != expected {
            return Err(TransferError::OffsetMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
    }
    Ok(file)
}

fn trace_curl(kind: InfoType, data: &[u8]) {
    let prefix = match kind {
        InfoType::Text => "*",
        InfoType::HeaderIn => "<",
        InfoType::HeaderOut => ">",
        _ => return,
    };
    let text = String::from_utf8_lossy(data);
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        tracing::debug!(target: "pagegrab_core::curl", "{} {}", prefix, line);
    }
}

/// Status code from a line like `HTTP/1.1 206 Partial Content` or `HTTP/2 200`.
fn parse_status_line(line: &str) -> Option<u32> {
    let mut parts = line.split_whitespace();
    let proto = parts.next()?;
    if !proto.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

fn parse_content_length(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

/// Complete length from `Content-Range: bytes a-b/N` or `bytes */N`.
fn parse_content_range_total(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-range") {
        return None;
    }
    value.trim().rsplit_once('/')?.1.trim().parse().ok()
}

impl From<&crate::config::TransferConfig> for TransferOptions {
    fn from(cfg: &crate::config::TransferConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit: cfg.low_speed_limit,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            max_redirections: cfg.max_redirections,
            user_agent: cfg.user_agent.clone(),
        }
    }
}
