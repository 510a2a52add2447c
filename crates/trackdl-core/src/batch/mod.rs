//! Batch orchestration: many tracks through resolve → fetch, one at a time.
//!
//! Tasks run strictly sequentially because every resolution drives the one
//! shared browser session. Failures never stop the run; they are retried in
//! up to `retry_passes` extra passes and whatever is still unresolved at the
//! end is written to the failure ledger.

mod pipeline;
mod task;

pub use pipeline::run_pipeline;
pub use task::DownloadTask;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::BatchConfig;
use crate::error::TrackError;
use crate::fetcher::{FetchOutcome, StreamFetcher};
use crate::ledger::FailureLedger;
use crate::model::TrackDescriptor;
use crate::naming::DestinationAllocator;
use crate::progress::{batch_eta, batch_percent, format_eta, BatchProgress, ProgressReporter};
use crate::resolver::StreamResolver;

/// Counts and leftovers of one batch run. `success_count` includes partial
/// results.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub success_count: usize,
    pub partial_count: usize,
    pub failure_count: usize,
    /// Attempts beyond the first that ended in success.
    pub recovered_count: usize,
    pub outcomes: Vec<FetchOutcome>,
    pub failed: Vec<DownloadTask>,
    pub ledger_path: Option<PathBuf>,
}

impl BatchResult {
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} downloaded, {} failed",
            self.success_count, self.failure_count
        );
        if self.partial_count > 0 {
            line.push_str(&format!(" ({} kept untranscoded)", self.partial_count));
        }
        line
    }
}

pub struct BatchOrchestrator<R, F> {
    resolver: R,
    fetcher: F,
    cfg: BatchConfig,
    extension: String,
}

impl<R: StreamResolver, F: StreamFetcher> BatchOrchestrator<R, F> {
    /// `extension` is the target format's file extension (e.g. "mp3").
    pub fn new(resolver: R, fetcher: F, cfg: BatchConfig, extension: impl Into<String>) -> Self {
        Self {
            resolver,
            fetcher,
            cfg,
            extension: extension.into(),
        }
    }

    /// Downloads every descriptor into `dest_dir`, then records the unresolved
    /// set in the ledger. Per-track failures are part of the result, not an
    /// error; `Err` means the run itself could not proceed.
    pub fn run(
        &self,
        descriptors: &[TrackDescriptor],
        dest_dir: &Path,
        reporter: &ProgressReporter,
    ) -> Result<BatchResult> {
        reporter.clear();
        std::fs::create_dir_all(dest_dir)
            .with_context(|| format!("create {}", dest_dir.display()))?;
        tracing::info!(total = descriptors.len(), dest = %dest_dir.display(), "batch started");

        let mut allocator = DestinationAllocator::new();
        let tasks: Vec<DownloadTask> = descriptors
            .iter()
            .map(|d| {
                let dest = allocator.allocate(dest_dir, d, &self.extension);
                DownloadTask::new(d.clone(), dest)
            })
            .collect();

        let clock = RunClock {
            started: Instant::now(),
            total: tasks.len(),
        };
        let mut result = BatchResult::default();
        let mut pending = tasks;
        let mut pass = 0u32;
        loop {
            if pass > 0 {
                pause(self.cfg.inter_pass_pause());
                for task in pending.iter_mut() {
                    if task.destination.exists() {
                        task.destination = allocator.reallocate(
                            &task.destination,
                            dest_dir,
                            &task.descriptor,
                            &self.extension,
                        );
                    }
                }
                tracing::info!(pass, remaining = pending.len(), "retry pass");
            }
            pending = self.run_pass(pass, pending, &clock, reporter, &mut result);
            if pending.is_empty() || pass >= self.cfg.retry_passes {
                break;
            }
            pass += 1;
        }

        result.failure_count = pending.len();
        let ledger = FailureLedger::in_dir(dest_dir, &self.cfg.ledger_filename);
        let unresolved: Vec<TrackDescriptor> =
            pending.iter().map(|t| t.descriptor.clone()).collect();
        result.ledger_path = ledger.store(&unresolved)?;
        result.failed = pending;

        tracing::info!(
            success = result.success_count,
            partial = result.partial_count,
            failed = result.failure_count,
            recovered = result.recovered_count,
            "batch finished"
        );
        reporter.clear();
        Ok(result)
    }

    /// One pass over `tasks`; returns the ones that failed.
    ///
    /// Progress counts settled tracks over the whole run: successes so far,
    /// plus failures once no pass is left to retry them.
    fn run_pass(
        &self,
        pass: u32,
        tasks: Vec<DownloadTask>,
        clock: &RunClock,
        reporter: &ProgressReporter,
        result: &mut BatchResult,
    ) -> Vec<DownloadTask> {
        let final_pass = pass >= self.cfg.retry_passes;
        let mut failed = Vec::new();

        for (i, mut task) in tasks.into_iter().enumerate() {
            if i > 0 {
                pause(self.cfg.inter_task_pause());
            }
            match self.attempt(&mut task, reporter) {
                Some(outcome) => {
                    result.success_count += 1;
                    if outcome.is_partial() {
                        result.partial_count += 1;
                    }
                    if task.attempt_count > 1 {
                        result.recovered_count += 1;
                    }
                    result.outcomes.push(outcome);
                }
                None => failed.push(task),
            }

            let settled = result.success_count + if final_pass { failed.len() } else { 0 };
            reporter.report_batch(clock.progress(pass, settled));
        }
        failed
    }

    fn attempt(
        &self,
        task: &mut DownloadTask,
        reporter: &ProgressReporter,
    ) -> Option<FetchOutcome> {
        task.attempt_count += 1;
        reporter.clear_track();
        reporter.set_status(task.label());

        let result = run_pipeline(
            &self.resolver,
            &self.fetcher,
            &task.descriptor,
            &task.destination,
            reporter,
        );
        match result {
            Ok(outcome) => {
                tracing::info!(
                    catalog_id = %task.descriptor.catalog_id,
                    attempt = task.attempt_count,
                    path = %outcome.path().display(),
                    partial = outcome.is_partial(),
                    "track done"
                );
                task.last_error = None;
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    catalog_id = %task.descriptor.catalog_id,
                    attempt = task.attempt_count,
                    kind = e.label(),
                    "track failed: {}",
                    e
                );
                reporter.set_status(format!("{}: {}", task.label(), e));
                task.last_error = Some(e);
                None
            }
        }
    }

    /// Single track to an explicit destination. No retries, no ledger.
    pub fn download_one(
        &self,
        descriptor: &TrackDescriptor,
        dest: &Path,
        reporter: &ProgressReporter,
    ) -> Result<FetchOutcome, TrackError> {
        reporter.clear();
        reporter.set_status(format!("{} - {}", descriptor.artist, descriptor.title));
        let result = run_pipeline(&self.resolver, &self.fetcher, descriptor, dest, reporter);
        match &result {
            Ok(outcome) => tracing::info!(path = %outcome.path().display(), "download complete"),
            Err(e) => tracing::warn!(catalog_id = %descriptor.catalog_id, "download failed: {}", e),
        }
        reporter.clear();
        result
    }

    /// Fresh destination for `descriptor` under `dir`.
    pub fn destination_in(&self, dir: &Path, descriptor: &TrackDescriptor) -> PathBuf {
        DestinationAllocator::new().allocate(dir, descriptor, &self.extension)
    }
}

/// Run-wide reference for batch percent and ETA.
struct RunClock {
    started: Instant,
    total: usize,
}

impl RunClock {
    fn progress(&self, pass: u32, completed: usize) -> BatchProgress {
        BatchProgress {
            pass,
            completed,
            total: self.total,
            percent: batch_percent(completed, self.total),
            eta_label: batch_eta(self.started.elapsed(), completed, self.total)
                .map(format_eta)
                .unwrap_or_default(),
        }
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}
