//! Manual playlist fetch: manifest, then each segment in order, concatenated
//! into one MPEG-TS container.

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use url::Url;

use super::http::{get_bytes, RequestHeaders};
use super::manifest::segment_urls;
use super::{finish_part, part_path, remove_part};
use crate::config::FetchConfig;
use crate::error::TrackError;
use crate::progress::{Phase, ProgressEvent, ProgressReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Wall-clock budget for the whole manual fetch. Every request timeout is
/// clamped to what is left of it.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    fn check(&self) -> Result<Duration, TrackError> {
        let left = self.at.saturating_duration_since(Instant::now());
        if left.is_zero() {
            Err(TrackError::Timeout {
                what: "manual segment fetch",
                limit: self.limit,
            })
        } else {
            Ok(left)
        }
    }

    /// `timeout`, or less if the deadline is closer. Fails once it has passed.
    fn clamp(&self, timeout: Duration) -> Result<Duration, TrackError> {
        Ok(timeout.min(self.check()?))
    }
}

/// Downloads the playlist at `manifest_url` into `container`.
///
/// A segment that fails is logged and skipped. Fails if the manifest cannot
/// be read, if no segment at all could be fetched, or with `Timeout` once
/// `manual_timeout` has elapsed.
pub fn fetch_segments(
    manifest_url: &str,
    container: &Path,
    headers: &RequestHeaders,
    cfg: &FetchConfig,
    reporter: &ProgressReporter,
) -> Result<SegmentSummary, TrackError> {
    let deadline = Deadline::after(cfg.manual_timeout());
    let base = Url::parse(manifest_url)
        .map_err(|e| TrackError::fetch(format!("bad manifest url: {}", e)))?;
    let timeout = deadline.clamp(cfg.manifest_timeout())?;
    let body = get_bytes(manifest_url, headers, timeout, "manifest")?;
    let segments = segment_urls(&String::from_utf8_lossy(&body), &base);
    if segments.is_empty() {
        return Err(TrackError::fetch("manifest lists no segments"));
    }
    tracing::info!(segments = segments.len(), "fetching playlist segments manually");

    let part = part_path(container);
    let result = write_segments(&segments, &part, headers, cfg, deadline, reporter);
    match result {
        Ok(summary) if summary.bytes > 0 => {
            finish_part(&part, container)?;
            if summary.skipped > 0 {
                tracing::warn!(
                    skipped = summary.skipped,
                    total = segments.len(),
                    "container is missing segments"
                );
            }
            Ok(summary)
        }
        Ok(_) => {
            remove_part(&part);
            Err(TrackError::fetch(format!(
                "none of {} segments could be fetched",
                segments.len()
            )))
        }
        Err(e) => {
            remove_part(&part);
            Err(e)
        }
    }
}

fn write_segments(
    segments: &[Url],
    part: &Path,
    headers: &RequestHeaders,
    cfg: &FetchConfig,
    deadline: Deadline,
    reporter: &ProgressReporter,
) -> Result<SegmentSummary, TrackError> {
    let file = File::create(part).with_context(|| format!("create {}", part.display()))?;
    let mut out = BufWriter::new(file);
    let mut summary = SegmentSummary {
        fetched: 0,
        skipped: 0,
        bytes: 0,
    };
    let total = segments.len();

    for (i, segment) in segments.iter().enumerate() {
        let timeout = deadline.clamp(cfg.segment_timeout())?;
        match get_bytes(segment.as_str(), headers, timeout, "segment") {
            Ok(bytes) => {
                out.write_all(&bytes)
                    .with_context(|| format!("write {}", part.display()))?;
                summary.fetched += 1;
                summary.bytes += bytes.len() as u64;
            }
            Err(e) => {
                // A segment cut short by the job deadline ends the job.
                deadline.check()?;
                tracing::warn!(index = i + 1, total, "skipping segment: {}", e);
                summary.skipped += 1;
            }
        }
        reporter.report(ProgressEvent::new(
            Phase::Downloading,
            (i + 1) as f64 * 100.0 / total as f64,
        ));
    }

    out.flush().with_context(|| format!("flush {}", part.display()))?;
    Ok(summary)
}
