//! `trackdl batch` – download every descriptor in a JSON file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use trackdl_core::batch::{BatchOrchestrator, BatchResult};
use trackdl_core::browser::SessionSlot;
use trackdl_core::config::TrackdlConfig;
use trackdl_core::fetcher::MediaFetcher;
use trackdl_core::model::TrackDescriptor;
use trackdl_core::progress::ProgressReporter;
use trackdl_core::resolver::SessionResolver;

use crate::cli::{display, session};

pub async fn run_batch_file(cfg: TrackdlConfig, descriptors: &Path, dest: PathBuf) -> Result<()> {
    let bytes =
        std::fs::read(descriptors).with_context(|| format!("read {}", descriptors.display()))?;
    let list: Vec<TrackDescriptor> =
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", descriptors.display()))?;
    if list.is_empty() {
        println!("No tracks in {}.", descriptors.display());
        return Ok(());
    }
    let result = run_batch(cfg, list, dest).await?;
    print_summary(&result);
    Ok(())
}

/// Runs the batch on a blocking worker and renders its progress until it ends.
pub async fn run_batch(
    cfg: TrackdlConfig,
    descriptors: Vec<TrackDescriptor>,
    dest: PathBuf,
) -> Result<BatchResult> {
    let reporter = ProgressReporter::new();
    let progress_handle = tokio::spawn(display::render(reporter.subscribe()));

    let worker = tokio::task::spawn_blocking(move || -> Result<BatchResult> {
        let mut slot = SessionSlot::new();
        let browser = session::attach(&mut slot, &cfg.session)?;
        let resolver = SessionResolver::new(browser, cfg.resolver.clone());
        let fetcher = MediaFetcher::new(cfg.fetch.clone(), cfg.session.clone());
        let orchestrator = BatchOrchestrator::new(
            resolver,
            fetcher,
            cfg.batch.clone(),
            cfg.fetch.audio_format.clone(),
        );
        orchestrator.run(&descriptors, &dest, &reporter)
    });
    let result = worker.await.context("batch worker join")?;
    let _ = progress_handle.await;
    result
}

fn print_summary(result: &BatchResult) {
    println!("{}", result.summary());
    for task in &result.failed {
        let reason = task
            .last_error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        println!("  failed: {}  ({})", task.label(), reason);
    }
    if let Some(path) = &result.ledger_path {
        println!("Unresolved tracks recorded in {}", path.display());
    }
}
