//! Resolve then fetch, with the descriptor's hint URL as a last resort.

use std::path::Path;

use crate::error::TrackError;
use crate::fetcher::{FetchOutcome, StreamFetcher};
use crate::model::{StreamLocator, TrackDescriptor};
use crate::progress::ProgressReporter;
use crate::resolver::StreamResolver;

pub fn run_pipeline<R, F>(
    resolver: &R,
    fetcher: &F,
    descriptor: &TrackDescriptor,
    dest: &Path,
    reporter: &ProgressReporter,
) -> Result<FetchOutcome, TrackError>
where
    R: StreamResolver + ?Sized,
    F: StreamFetcher + ?Sized,
{
    let primary = resolver.resolve(descriptor, reporter).and_then(|locator| {
        let cookies = resolver.cookies();
        fetcher.fetch(locator, dest, &cookies, reporter)
    });

    let err = match primary {
        Ok(outcome) => return Ok(outcome),
        Err(e) => e,
    };
    let Some(hint) = descriptor.usable_hint_url() else {
        return Err(err);
    };

    tracing::info!(
        catalog_id = %descriptor.catalog_id,
        "{}; trying hint url {}",
        err,
        crate::logging::url_prefix(hint)
    );
    let cookies = resolver.cookies();
    match fetcher.fetch(StreamLocator::direct(hint), dest, &cookies, reporter) {
        Ok(outcome) => Ok(outcome),
        Err(hint_err) => {
            tracing::debug!(
                catalog_id = %descriptor.catalog_id,
                "hint url failed too: {}",
                hint_err
            );
            Err(err)
        }
    }
}
