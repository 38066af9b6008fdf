//! `fetchq show` – task outcomes of one run.

use anyhow::Result;
use fetchq_core::history::RunHistory;

use super::{age, mib};

pub async fn run_show(id: i64) -> Result<()> {
    let db = RunHistory::open_default().await?;
    let Some(run) = db.get_run(id).await? else {
        anyhow::bail!("no run with id {}", id);
    };
    println!(
        "Run {} ({}): {} of {} completed, {} failed, {}{}",
        run.id,
        age(run.started_at),
        run.completed,
        run.total_submitted,
        run.failed_terminal,
        mib(run.total_bytes.max(0) as u64),
        if run.cancelled { ", cancelled" } else { "" }
    );

    let outcomes = db.task_outcomes(id).await?;
    println!("{:<20} {:<16} {:>8} {:>12}  {}", "TASK", "STATUS", "ATTEMPTS", "SIZE", "DESTINATION");
    for t in outcomes {
        println!(
            "{:<20} {:<16} {:>8} {:>12}  {}",
            t.task_id,
            t.status.as_str(),
            t.attempts,
            mib(t.final_size.max(0) as u64),
            t.destination
        );
        if let (Some(kind), Some(message)) = (&t.error_kind, &t.error_message) {
            println!("{:<20} last error ({}): {}", "", kind, message);
        }
    }
    Ok(())
}
