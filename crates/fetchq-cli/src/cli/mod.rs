//! CLI for the fetchq batch download engine.

mod commands;
mod manifest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use fetchq_core::config;
use std::path::PathBuf;

use commands::{run_batch, run_completions, run_history, run_probe, run_show, RunOptions};

/// Top-level CLI for fetchq.
#[derive(Debug, Parser)]
#[command(name = "fetchq")]
#[command(about = "fetchq: bounded-parallel, resumable batch downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every task in a manifest (JSON or TOML).
    Run {
        /// Path to the manifest file.
        manifest: PathBuf,
        /// Maximum number of simultaneous downloads (overrides config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Attempts per task, including the first (overrides config).
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
        /// Always download from byte 0, even if a partial file exists.
        #[arg(long)]
        no_resume: bool,
        /// Per-attempt timeout in seconds (overrides config).
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Resolve relative destinations under this directory.
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,
        /// Do not record this run in the history database.
        #[arg(long)]
        no_history: bool,
        /// Print the final summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show remote size and range support for a URL.
    Probe {
        /// Direct HTTP/HTTPS URL.
        url: String,
    },

    /// List recent runs.
    History {
        /// Number of runs to show.
        #[arg(long, default_value = "20", value_name = "N")]
        limit: u32,
    },

    /// Show the task outcomes of one run.
    Show {
        /// Run identifier (see `fetchq history`).
        id: i64,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                manifest,
                concurrency,
                max_attempts,
                no_resume,
                timeout_secs,
                base_dir,
                no_history,
                json,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let opts = RunOptions {
                    concurrency,
                    max_attempts,
                    no_resume,
                    timeout_secs,
                    base_dir,
                    record_history: !no_history,
                    json,
                };
                run_batch(cfg, &manifest, opts).await?;
            }
            CliCommand::Probe { url } => {
                let cfg = config::load_or_init()?;
                run_probe(&cfg, &url).await?;
            }
            CliCommand::History { limit } => run_history(limit).await?,
            CliCommand::Show { id } => run_show(id).await?,
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
