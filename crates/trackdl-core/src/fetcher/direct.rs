//! Single-file HTTP download with markup rejection and throttled progress.

use anyhow::Context;
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str;
use std::time::{Duration, Instant};

use super::http::{curl_failure, get_handle, is_success, RequestHeaders};
use super::{finish_part, part_path, remove_part};
use crate::config::FetchConfig;
use crate::error::TrackError;
use crate::progress::{format_eta, format_speed, Phase, ProgressEvent, ProgressReporter};

/// Content types that mean "a page came back instead of audio".
const MARKUP_TYPES: [&str; 4] = [
    "text/html",
    "application/xhtml+xml",
    "text/xml",
    "application/xml",
];

pub fn is_markup(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    MARKUP_TYPES.contains(&essence.as_str())
}

/// Emits at most one progress sample per `interval`.
pub struct RateWindow {
    interval: Duration,
    last_at: Instant,
    last_bytes: u64,
}

impl RateWindow {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_at: now,
            last_bytes: 0,
        }
    }

    /// Bytes per second since the previous sample, or None if it is too soon.
    pub fn sample(&mut self, now: Instant, bytes: u64) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.last_at);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }
        let speed = bytes.saturating_sub(self.last_bytes) as f64 / elapsed.as_secs_f64();
        self.last_at = now;
        self.last_bytes = bytes;
        Some(speed)
    }
}

/// Builds the Downloading event for `received` of `total` bytes at `speed`.
pub fn direct_event(received: u64, total: Option<u64>, speed: f64) -> ProgressEvent {
    let mut event = match total {
        Some(t) if t > 0 => {
            ProgressEvent::new(Phase::Downloading, received as f64 * 100.0 / t as f64)
        }
        _ => ProgressEvent::new(Phase::Downloading, 0.0),
    };
    event = event.with_speed(format_speed(speed));
    if let Some(t) = total {
        if speed > 0.0 {
            let remaining = t.saturating_sub(received) as f64 / speed;
            event = event.with_eta(format_eta(Duration::from_secs_f64(remaining)));
        }
    }
    event
}

#[derive(Default)]
struct ResponseHead {
    status: Cell<u32>,
    content_type: RefCell<Option<String>>,
    content_length: Cell<Option<u64>>,
}

impl ResponseHead {
    /// Each redirect hop starts a new header block at its status line.
    fn push_line(&self, line: &str) {
        let line = line.trim_end();
        if line.starts_with("HTTP/") {
            let code = line
                .split_whitespace()
                .nth(1)
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            self.status.set(code);
            self.content_type.replace(None);
            self.content_length.set(None);
        } else if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-type") {
                self.content_type.replace(Some(value.to_string()));
            } else if name.eq_ignore_ascii_case("content-length") {
                self.content_length.set(value.parse().ok());
            }
        }
    }

    /// Why the body must not be written, if anything.
    fn rejection(&self) -> Option<String> {
        let status = self.status.get();
        if !is_success(status) {
            return Some(format!("HTTP {}", status));
        }
        match self.content_type.borrow().as_deref() {
            Some(ct) if is_markup(ct) => Some(format!(
                "server returned {} instead of audio (expired link or login page)",
                ct
            )),
            _ => None,
        }
    }
}

/// Streams `url` into `dest` via `dest.part`. Returns the byte count.
pub fn download_direct(
    url: &str,
    dest: &Path,
    headers: &RequestHeaders,
    cfg: &FetchConfig,
    reporter: &ProgressReporter,
) -> Result<u64, TrackError> {
    let part = part_path(dest);
    match stream_to(url, &part, headers, cfg, reporter) {
        Ok(bytes) => {
            finish_part(&part, dest)?;
            reporter.report(ProgressEvent::new(Phase::Finalizing, 100.0));
            tracing::info!(bytes, dest = %dest.display(), "direct download complete");
            Ok(bytes)
        }
        Err(e) => {
            remove_part(&part);
            Err(e)
        }
    }
}

fn stream_to(
    url: &str,
    part: &Path,
    headers: &RequestHeaders,
    cfg: &FetchConfig,
    reporter: &ProgressReporter,
) -> Result<u64, TrackError> {
    let limit = cfg.direct_timeout();
    let file = File::create(part).with_context(|| format!("create {}", part.display()))?;
    let mut out = BufWriter::new(file);

    let head = ResponseHead::default();
    let rejected: RefCell<Option<String>> = RefCell::new(None);
    let write_error: RefCell<Option<std::io::Error>> = RefCell::new(None);
    let mut received: u64 = 0;
    let mut window = RateWindow::new(cfg.progress_interval(), Instant::now());

    let mut easy = get_handle(url, headers, limit).map_err(|e| curl_failure(e, "download", limit))?;
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    head.push_line(line);
                }
                true
            })
            .map_err(|e| curl_failure(e, "download", limit))?;
        transfer
            .write_function(|data| {
                if received == 0 {
                    if let Some(reason) = head.rejection() {
                        rejected.replace(Some(reason));
                        return Ok(0);
                    }
                }
                if let Err(e) = out.write_all(data) {
                    write_error.replace(Some(e));
                    return Ok(0);
                }
                received += data.len() as u64;
                if let Some(speed) = window.sample(Instant::now(), received) {
                    reporter.report(direct_event(received, head.content_length.get(), speed));
                }
                Ok(data.len())
            })
            .map_err(|e| curl_failure(e, "download", limit))?;
        transfer.perform()
    };

    if let Some(reason) = rejected.into_inner() {
        return Err(TrackError::fetch(reason));
    }
    if let Some(e) = write_error.into_inner() {
        return Err(TrackError::Fetch(
            anyhow::Error::new(e).context(format!("write {}", part.display())),
        ));
    }
    performed.map_err(|e| curl_failure(e, "download", limit))?;

    // Empty bodies never reach the write callback.
    if let Some(reason) = head.rejection() {
        return Err(TrackError::fetch(reason));
    }
    if received == 0 {
        return Err(TrackError::fetch("server returned an empty body"));
    }
    out.flush().with_context(|| format!("flush {}", part.display()))?;
    Ok(received)
}
