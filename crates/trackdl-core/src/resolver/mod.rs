//! Turning a track descriptor into a fetchable stream locator.
//!
//! The batch layer only depends on the `StreamResolver` trait. `SessionResolver`
//! implements it against a logged-in browser session: find the row, start
//! playback, then read the URL out of the page player or the network log.

mod locate;
mod netlog;
mod probe;

pub use locate::{locate_row, primary_selector, trigger_playback};
pub use netlog::{pick_stream_url, synthesize_manifest};
pub use probe::{accept_url, first_url, probe_script, ProbeStrategy, PAUSE_SCRIPT};

use crate::browser::{network_request_urls, BrowserSession, Cookie};
use crate::config::ResolverConfig;
use crate::error::TrackError;
use crate::model::{StreamLocator, TrackDescriptor};
use crate::progress::{Phase, ProgressEvent, ProgressReporter};

pub trait StreamResolver {
    fn resolve(
        &self,
        descriptor: &TrackDescriptor,
        reporter: &ProgressReporter,
    ) -> Result<StreamLocator, TrackError>;

    /// Cookies the fetcher should present for resolved URLs.
    fn cookies(&self) -> Vec<Cookie> {
        Vec::new()
    }
}

impl<T: StreamResolver + ?Sized> StreamResolver for &T {
    fn resolve(
        &self,
        descriptor: &TrackDescriptor,
        reporter: &ProgressReporter,
    ) -> Result<StreamLocator, TrackError> {
        (**self).resolve(descriptor, reporter)
    }

    fn cookies(&self) -> Vec<Cookie> {
        (**self).cookies()
    }
}

pub struct SessionResolver<'s, S: BrowserSession + ?Sized> {
    session: &'s S,
    cfg: ResolverConfig,
}

impl<'s, S: BrowserSession + ?Sized> SessionResolver<'s, S> {
    pub fn new(session: &'s S, cfg: ResolverConfig) -> Self {
        Self { session, cfg }
    }

    fn poll_player(&self, catalog_id: &str) -> Option<String> {
        for attempt in 1..=self.cfg.poll_attempts {
            std::thread::sleep(self.cfg.poll_interval());
            if let Some((strategy, url)) = first_url(self.session, &ProbeStrategy::ALL) {
                tracing::debug!(
                    catalog_id,
                    attempt,
                    probe = strategy.name(),
                    url = %crate::logging::url_prefix(&url),
                    "player reported stream url"
                );
                return Some(url);
            }
        }
        None
    }

    fn scan_network_log(&self) -> Option<String> {
        match self.session.performance_log() {
            Ok(entries) => pick_stream_url(&network_request_urls(&entries), &self.cfg),
            Err(e) => {
                tracing::warn!("performance log unavailable: {}", e);
                None
            }
        }
    }
}

impl<S: BrowserSession + ?Sized> StreamResolver for SessionResolver<'_, S> {
    fn resolve(
        &self,
        descriptor: &TrackDescriptor,
        reporter: &ProgressReporter,
    ) -> Result<StreamLocator, TrackError> {
        let catalog_id = descriptor.catalog_id.as_str();
        reporter.report(ProgressEvent::new(Phase::Resolving, 0.0));

        let row = locate_row(self.session, &self.cfg, catalog_id)
            .map_err(|e| TrackError::ResolutionFailed {
                catalog_id: catalog_id.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| TrackError::NotFound {
                catalog_id: catalog_id.to_string(),
            })?;

        // Requests from earlier tracks must not be mistaken for this one.
        if let Err(e) = self.session.performance_log() {
            tracing::debug!("could not drain performance log: {}", e);
        }

        let _pause = PlaybackGuard {
            session: self.session,
        };
        trigger_playback(self.session, &self.cfg, &row);

        let url = self
            .poll_player(catalog_id)
            .or_else(|| self.scan_network_log())
            .ok_or_else(|| TrackError::ResolutionFailed {
                catalog_id: catalog_id.to_string(),
                reason: format!(
                    "no stream url after {} probes and the network log",
                    self.cfg.poll_attempts
                ),
            })?;

        let locator = StreamLocator::from_url(url);
        tracing::info!(
            catalog_id,
            kind = ?locator.kind(),
            url = %crate::logging::url_prefix(locator.url()),
            "resolved stream"
        );
        Ok(locator)
    }

    fn cookies(&self) -> Vec<Cookie> {
        match self.session.cookies() {
            Ok(cookies) => cookies,
            Err(e) => {
                tracing::warn!("could not read session cookies: {}", e);
                Vec::new()
            }
        }
    }
}

/// Pauses the page player when dropped, whatever the resolve outcome.
struct PlaybackGuard<'s, S: BrowserSession + ?Sized> {
    session: &'s S,
}

impl<S: BrowserSession + ?Sized> Drop for PlaybackGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.session.evaluate_script(PAUSE_SCRIPT, &[]) {
            tracing::debug!("pause failed: {}", e);
        }
    }
}
