//! `trackdl retry-failed` – rerun the failure ledger of an earlier batch.

use anyhow::Result;
use std::path::PathBuf;
use trackdl_core::config::TrackdlConfig;
use trackdl_core::ledger::FailureLedger;

use super::batch::run_batch;

pub async fn run_retry_failed(cfg: TrackdlConfig, dir: PathBuf) -> Result<()> {
    let ledger = FailureLedger::in_dir(&dir, &cfg.batch.ledger_filename);
    let failed = ledger.load()?;
    if failed.is_empty() {
        println!("No failed tracks recorded in {}.", dir.display());
        return Ok(());
    }
    tracing::info!(count = failed.len(), path = %ledger.path().display(), "retrying ledger");
    let result = run_batch(cfg, failed, dir).await?;
    println!("{}", result.summary());
    if let Some(path) = &result.ledger_path {
        println!("Still unresolved: see {}", path.display());
    }
    Ok(())
}
