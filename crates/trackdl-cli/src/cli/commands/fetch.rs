//! `trackdl fetch` – download one track.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use trackdl_core::batch::BatchOrchestrator;
use trackdl_core::browser::SessionSlot;
use trackdl_core::config::TrackdlConfig;
use trackdl_core::fetcher::{FetchOutcome, MediaFetcher};
use trackdl_core::model::TrackDescriptor;
use trackdl_core::progress::ProgressReporter;
use trackdl_core::resolver::SessionResolver;

use crate::cli::{display, session};

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Catalog id (`owner_audio`) of the track on the current page.
    #[arg(long, value_name = "ID")]
    pub catalog_id: String,
    #[arg(long)]
    pub artist: String,
    #[arg(long)]
    pub title: String,
    /// Stream URL seen at discovery time, tried if resolution fails.
    #[arg(long, value_name = "URL")]
    pub hint_url: Option<String>,
    /// Exact output file.
    #[arg(long, short = 'o', value_name = "PATH", conflicts_with = "dest")]
    pub output: Option<PathBuf>,
    /// Directory to save into under a name derived from artist and title
    /// (default: current directory).
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,
}

impl FetchArgs {
    fn descriptor(&self) -> TrackDescriptor {
        let d = TrackDescriptor::new(&self.artist, &self.title, &self.catalog_id);
        match &self.hint_url {
            Some(url) => d.with_hint_url(url),
            None => d,
        }
    }
}

pub async fn run_fetch(cfg: TrackdlConfig, args: FetchArgs) -> Result<()> {
    let descriptor = args.descriptor();
    let dest_dir = match &args.dest {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    let reporter = ProgressReporter::new();
    let progress_handle = tokio::spawn(display::render(reporter.subscribe()));

    let worker = tokio::task::spawn_blocking(move || -> Result<FetchOutcome> {
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
        let dest = match args.output {
            Some(path) => path,
            None => {
                std::fs::create_dir_all(&dest_dir)
                    .with_context(|| format!("create {}", dest_dir.display()))?;
                orchestrator.destination_in(&dest_dir, &descriptor)
            }
        };
        Ok(orchestrator.download_one(&descriptor, &dest, &reporter)?)
    });
    let outcome = worker.await.context("fetch worker join")?;
    let _ = progress_handle.await;

    match outcome? {
        FetchOutcome::Complete(path) => println!("Saved {}", path.display()),
        FetchOutcome::Partial(path) => println!(
            "Saved {} (could not transcode; kept the stream container)",
            path.display()
        ),
    }
    Ok(())
}
