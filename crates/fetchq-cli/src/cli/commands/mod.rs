//! CLI command handlers. Each command is in its own file.

mod completions;
mod history;
mod probe;
mod run;
mod show;

pub use completions::run_completions;
pub use history::run_history;
pub use probe::run_probe;
pub use run::{run_batch, RunOptions};
pub use show::run_show;

/// Bytes as MiB with one decimal.
pub(crate) fn mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / 1_048_576.0)
}

/// Seconds-ago as a short human string.
pub(crate) fn age(unix_secs: i64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(unix_secs);
    let secs = (now - unix_secs).max(0);
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
