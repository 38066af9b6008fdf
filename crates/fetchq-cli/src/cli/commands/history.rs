//! `fetchq history` – list recent runs.

use anyhow::Result;
use fetchq_core::history::RunHistory;

use super::{age, mib};

pub async fn run_history(limit: u32) -> Result<()> {
    let db = RunHistory::open_default().await?;
    let runs = db.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }
    println!(
        "{:<6} {:<10} {:>6} {:>6} {:>6} {:>12} {:>9}  {}",
        "ID", "STARTED", "TASKS", "DONE", "FAILED", "BYTES", "SECS", "NOTE"
    );
    for r in runs {
        let note = if r.cancelled {
            format!("cancelled, {} unfinished", r.unfinished)
        } else {
            String::new()
        };
        println!(
            "{:<6} {:<10} {:>6} {:>6} {:>6} {:>12} {:>9.1}  {}",
            r.id,
            age(r.started_at),
            r.total_submitted,
            r.completed,
            r.failed_terminal,
            mib(r.total_bytes.max(0) as u64),
            r.elapsed_ms as f64 / 1000.0,
            note
        );
    }
    Ok(())
}
