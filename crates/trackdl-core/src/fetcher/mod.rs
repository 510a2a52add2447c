//! Materializing a resolved stream as a local file.
//!
//! Playlists go through the external segmented-stream tool first and fall
//! back to a manual manifest walk plus transcode. Direct files are streamed
//! over HTTP. Every path is bounded by its own timeout.

mod cookies_file;
mod direct;
mod http;
mod manifest;
mod segments;
mod tool;
mod tool_progress;
mod transcode;

pub use cookies_file::{cookie_domain_for, write_cookie_file};
pub use direct::{download_direct, is_markup};
pub use http::{get_bytes, RequestHeaders};
pub use manifest::segment_urls;
pub use segments::{fetch_segments, SegmentSummary};
pub use tool::run_tool;
pub use tool_progress::{overall_percent, parse_tool_line, ToolLine};
pub use transcode::transcode;

use anyhow::Context;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::browser::Cookie;
use crate::config::{FetchConfig, SessionConfig};
use crate::error::{ToolError, TrackError};
use crate::model::{LocatorKind, StreamLocator};
use crate::naming::unique_destination;
use crate::progress::{Phase, ProgressEvent, ProgressReporter};

/// Extension of the container assembled by the manual playlist fetch.
const CONTAINER_EXT: &str = "ts";

/// What a successful fetch left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The target file, in the target format.
    Complete(PathBuf),
    /// A playable container that could not be transcoded.
    Partial(PathBuf),
}

impl FetchOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FetchOutcome::Complete(p) | FetchOutcome::Partial(p) => p,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, FetchOutcome::Partial(_))
    }
}

pub trait StreamFetcher {
    /// Consumes `locator` and writes its content to `dest` (or, for a partial
    /// result, next to it).
    fn fetch(
        &self,
        locator: StreamLocator,
        dest: &Path,
        cookies: &[Cookie],
        reporter: &ProgressReporter,
    ) -> Result<FetchOutcome, TrackError>;
}

impl<T: StreamFetcher + ?Sized> StreamFetcher for &T {
    fn fetch(
        &self,
        locator: StreamLocator,
        dest: &Path,
        cookies: &[Cookie],
        reporter: &ProgressReporter,
    ) -> Result<FetchOutcome, TrackError> {
        (**self).fetch(locator, dest, cookies, reporter)
    }
}

/// The production fetcher.
#[derive(Debug, Clone, Default)]
pub struct MediaFetcher {
    cfg: FetchConfig,
    session: SessionConfig,
}

impl MediaFetcher {
    pub fn new(cfg: FetchConfig, session: SessionConfig) -> Self {
        Self { cfg, session }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.cfg
    }

    fn fetch_playlist(
        &self,
        url: &str,
        dest: &Path,
        cookies: &[Cookie],
        reporter: &ProgressReporter,
    ) -> Result<FetchOutcome, TrackError> {
        match self.run_extractor(url, dest, cookies, reporter) {
            Ok(()) => return Ok(FetchOutcome::Complete(dest.to_path_buf())),
            Err(ToolError::Timeout { limit, .. }) => {
                return Err(TrackError::Timeout {
                    what: "stream download tool",
                    limit,
                })
            }
            Err(e) => tracing::warn!("{}; falling back to manual segment fetch", e),
        }

        let headers = RequestHeaders::new(&self.session, cookies);
        let container = container_path(dest);
        let summary = fetch_segments(url, &container, &headers, &self.cfg, reporter)?;
        tracing::info!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            bytes = summary.bytes,
            container = %container.display(),
            "segments assembled"
        );

        reporter.report(ProgressEvent::new(Phase::Converting, 100.0));
        match transcode(&self.cfg, &container, dest) {
            Ok(()) => {
                if let Err(e) = std::fs::remove_file(&container) {
                    tracing::debug!(
                        path = %container.display(),
                        "could not remove container: {}",
                        e
                    );
                }
                reporter.report(ProgressEvent::new(Phase::Finalizing, 100.0));
                Ok(FetchOutcome::Complete(dest.to_path_buf()))
            }
            Err(e) => {
                tracing::warn!("{}; keeping untranscoded container", e);
                Ok(FetchOutcome::Partial(container))
            }
        }
    }

    fn run_extractor(
        &self,
        url: &str,
        dest: &Path,
        cookies: &[Cookie],
        reporter: &ProgressReporter,
    ) -> Result<(), ToolError> {
        let program = self.cfg.tool_program.as_str();
        // Session cookies are not fatal to lose; the URL is often self-signed.
        let cookie_file = if cookies.is_empty() {
            None
        } else {
            match write_cookie_file(cookies, &cookie_domain_for(&self.session.referer)) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!("no cookie file for {}: {:#}", program, e);
                    None
                }
            }
        };
        let args = extractor_args(
            &self.cfg,
            &self.session,
            url,
            dest,
            cookie_file.as_ref().map(|f| f.path()),
        );

        let mut last_percent = 0.0;
        run_tool(program, &args, self.cfg.tool_timeout(), |line| {
            match parse_tool_line(line) {
                Some(ToolLine::Progress { percent, speed, eta }) => {
                    last_percent = percent;
                    let mut event = ProgressEvent::new(Phase::Downloading, percent);
                    if let Some(speed) = speed {
                        event = event.with_speed(speed);
                    }
                    if let Some(eta) = eta {
                        event = event.with_eta(eta);
                    }
                    reporter.report(event);
                }
                Some(ToolLine::Phase(phase)) => {
                    let percent = if phase == Phase::Downloading { last_percent } else { 100.0 };
                    reporter.report(ProgressEvent::new(phase, percent));
                }
                None => tracing::trace!(program, "{}", line),
            }
        })?;

        if dest.exists() {
            Ok(())
        } else {
            Err(ToolError::MissingOutput {
                program: program.to_string(),
                path: dest.to_path_buf(),
            })
        }
    }
}

impl StreamFetcher for MediaFetcher {
    fn fetch(
        &self,
        locator: StreamLocator,
        dest: &Path,
        cookies: &[Cookie],
        reporter: &ProgressReporter,
    ) -> Result<FetchOutcome, TrackError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let kind = locator.kind();
        let url = locator.into_url();
        tracing::info!(
            kind = ?kind,
            url = %crate::logging::url_prefix(&url),
            dest = %dest.display(),
            cookies = cookies.len(),
            "fetching"
        );
        reporter.report(ProgressEvent::new(Phase::Downloading, 0.0));

        match kind {
            LocatorKind::Playlist => self.fetch_playlist(&url, dest, cookies, reporter),
            LocatorKind::DirectFile => {
                let headers = RequestHeaders::new(&self.session, cookies);
                download_direct(&url, dest, &headers, &self.cfg, reporter)?;
                Ok(FetchOutcome::Complete(dest.to_path_buf()))
            }
        }
    }
}

/// `<dest>.%(ext)s` output template and audio extraction flags.
pub fn extractor_args(
    cfg: &FetchConfig,
    session: &SessionConfig,
    url: &str,
    dest: &Path,
    cookie_file: Option<&Path>,
) -> Vec<OsString> {
    let template = dest.with_extension("%(ext)s");
    let mut args: Vec<OsString> = vec![
        "--newline".into(),
        "--no-warnings".into(),
        "--no-playlist".into(),
        "-x".into(),
        "--audio-format".into(),
        cfg.audio_format.as_str().into(),
        "--audio-quality".into(),
        cfg.audio_quality.as_str().into(),
        "-o".into(),
        template.into_os_string(),
    ];
    if !session.user_agent.is_empty() {
        args.push("--user-agent".into());
        args.push(session.user_agent.as_str().into());
    }
    if !session.referer.is_empty() {
        args.push("--referer".into());
        args.push(session.referer.as_str().into());
    }
    if let Some(path) = cookie_file {
        args.push("--cookies".into());
        args.push(path.into());
    }
    args.push(url.into());
    args
}

/// `a.mp3` → `a.mp3.part`.
pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Untranscoded container next to `dest`: `a.mp3` → `a.ts`, or `a (k).ts`
/// when an earlier run left one behind.
pub(crate) fn container_path(dest: &Path) -> PathBuf {
    let dir = dest.parent().unwrap_or_else(|| Path::new(""));
    let base = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    unique_destination(dir, &base, CONTAINER_EXT, &HashSet::new())
}

/// Moves a finished `.part` file into place. Never replaces an existing file;
/// in that case the `.part` file is discarded.
pub(crate) fn finish_part(part: &Path, dest: &Path) -> Result<(), TrackError> {
    if dest.exists() {
        remove_part(part);
        return Err(TrackError::fetch(format!(
            "{} already exists, not overwriting",
            dest.display()
        )));
    }
    std::fs::rename(part, dest)
        .with_context(|| format!("rename {} to {}", part.display(), dest.display()))?;
    Ok(())
}

pub(crate) fn remove_part(part: &Path) {
    if let Err(e) = std::fs::remove_file(part) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(path = %part.display(), "could not remove partial file: {}", e);
        }
    }
}
