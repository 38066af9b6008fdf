//! `fetchq run` – download a manifest with the engine.

use anyhow::{Context, Result};
use fetchq_core::history::RunHistory;
use fetchq_core::{Coordinator, EngineConfig, EngineEvent, RunSummary};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::mib;
use crate::cli::manifest::load_manifest;

/// Command-line overrides for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub no_resume: bool,
    pub timeout_secs: Option<u64>,
    pub base_dir: Option<PathBuf>,
    pub record_history: bool,
    pub json: bool,
}

impl RunOptions {
    /// Apply flags on top of the file configuration.
    pub fn apply(&self, mut cfg: EngineConfig) -> EngineConfig {
        if let Some(n) = self.concurrency {
            cfg.concurrency_limit = n;
        }
        if let Some(n) = self.max_attempts {
            cfg.max_attempts_per_task = n;
        }
        if self.no_resume {
            cfg.resume_enabled = false;
        }
        if let Some(secs) = self.timeout_secs {
            cfg.per_attempt_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(dir) = &self.base_dir {
            cfg.base_dir = Some(dir.clone());
        }
        cfg
    }
}

pub async fn run_batch(cfg: EngineConfig, manifest: &Path, opts: RunOptions) -> Result<()> {
    let specs = load_manifest(manifest)?;
    let cfg = opts.apply(cfg);

    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<EngineEvent>(1024);
    let mut coordinator = Coordinator::new(cfg)?.with_events(event_tx);
    let count = coordinator.submit(specs)?;
    println!(
        "Downloading {} task(s), up to {} at a time.",
        count,
        coordinator.config().concurrency_limit
    );

    let cancel = coordinator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling: waiting for active downloads to finish...");
            cancel.cancel();
        }
    });

    let printer = tokio::spawn(print_events(event_rx));
    let summary = tokio::task::spawn_blocking(move || coordinator.run())
        .await
        .context("engine thread panicked")??;
    let _ = printer.await;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if opts.record_history {
        match RunHistory::open_default().await {
            Ok(db) => {
                let id = db.record_run(&summary).await?;
                println!("Recorded as run {} (see `fetchq show {}`).", id, id);
            }
            Err(e) => tracing::warn!("could not open history database: {:#}", e),
        }
    }

    if summary.failed_terminal > 0 {
        anyhow::bail!("{} task(s) failed", summary.failed_terminal);
    }
    if summary.cancelled {
        anyhow::bail!(
            "run cancelled with {} task(s) unfinished",
            summary.not_attempted.len() + summary.interrupted.len()
        );
    }
    Ok(())
}

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

async fn print_events(mut rx: tokio::sync::mpsc::Receiver<EngineEvent>) {
    let mut last_print = Instant::now();
    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::Dispatched {
                task_id, attempt, ..
            } if attempt > 1 => println!("  [{}] retry, attempt {}", task_id, attempt),
            EngineEvent::Progress { task_id, sample } => {
                let now = Instant::now();
                if now.duration_since(last_print) >= PROGRESS_INTERVAL {
                    let pct = sample
                        .fraction()
                        .map(|f| format!("{:.1}%", f * 100.0))
                        .unwrap_or_else(|| "?".to_string());
                    let total = sample.total.map(mib).unwrap_or_else(|| "?".to_string());
                    println!(
                        "  [{}] {} / {} ({})  {:.2} MiB/s",
                        task_id,
                        mib(sample.bytes_transferred),
                        total,
                        pct,
                        sample.bytes_per_sec / 1_048_576.0
                    );
                    last_print = now;
                }
            }
            EngineEvent::Completed {
                task_id,
                final_size,
                skipped,
                ..
            } => {
                if skipped {
                    println!("  [{}] already complete ({})", task_id, mib(final_size));
                } else {
                    println!("  [{}] done ({})", task_id, mib(final_size));
                }
            }
            EngineEvent::Failed {
                task_id,
                attempt,
                kind,
                message,
                terminal,
            } => {
                let what = if terminal { "FAILED" } else { "failed" };
                println!("  [{}] {} on attempt {} ({}): {}", task_id, what, attempt, kind, message);
            }
            _ => {}
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} completed, {} failed, {} not finished of {} task(s); {} in {:.1}s ({:.2} MiB/s, peak {} active)",
        summary.completed,
        summary.failed_terminal,
        summary.not_attempted.len() + summary.interrupted.len(),
        summary.total_submitted,
        mib(summary.total_bytes),
        summary.elapsed_ms as f64 / 1000.0,
        summary.average_speed / 1_048_576.0,
        summary.peak_active
    );
    for task in summary.failed_tasks() {
        let reason = task
            .last_error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  failed: {} -> {} ({})", task.id, task.destination.display(), reason);
    }
    if summary.cancelled {
        for id in &summary.not_attempted {
            println!("  not attempted: {}", id);
        }
        for id in &summary.interrupted {
            println!("  interrupted: {}", id);
        }
    }
}
