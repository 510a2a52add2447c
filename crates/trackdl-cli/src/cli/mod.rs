//! CLI for trackdl.

mod commands;
mod display;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trackdl_core::config::{self, TrackdlConfig};

use commands::{run_batch_file, run_completions, run_fetch, run_retry_failed, FetchArgs};

/// Top-level CLI for trackdl.
#[derive(Debug, Parser)]
#[command(name = "trackdl")]
#[command(
    about = "trackdl: download tracks through a logged-in browser session",
    long_about = None
)]
pub struct Cli {
    /// WebDriver endpoint that owns the browser session.
    #[arg(long, global = true, value_name = "URL")]
    pub webdriver_url: Option<String>,

    /// Existing WebDriver session id to attach to.
    #[arg(long, global = true, value_name = "ID")]
    pub session_id: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a single track.
    Fetch(FetchArgs),

    /// Download every track listed in a JSON descriptor file.
    Batch {
        /// JSON array of track descriptors.
        descriptors: PathBuf,
        /// Directory the tracks are saved into.
        #[arg(long, value_name = "DIR")]
        dest: PathBuf,
    },

    /// Re-run the tracks recorded in DIR's failure ledger.
    RetryFailed {
        /// Directory of the earlier batch run.
        dir: PathBuf,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    /// Command-line session flags take precedence over the config file.
    fn apply_overrides(&self, cfg: &mut TrackdlConfig) {
        if let Some(url) = &self.webdriver_url {
            cfg.session.webdriver_url = url.clone();
        }
        if let Some(id) = &self.session_id {
            cfg.session.session_id = Some(id.clone());
        }
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = &cli.command {
            run_completions(*shell);
            return Ok(());
        }

        let mut cfg = config::load_or_init()?;
        cli.apply_overrides(&mut cfg);
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch(args) => run_fetch(cfg, args).await?,
            CliCommand::Batch { descriptors, dest } => {
                run_batch_file(cfg, &descriptors, dest).await?
            }
            CliCommand::RetryFailed { dir } => run_retry_failed(cfg, dir).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
