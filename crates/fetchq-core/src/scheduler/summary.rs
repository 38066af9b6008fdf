use serde::Serialize;
use std::time::SystemTime;

use crate::task::DownloadTask;

/// Result of one `Coordinator::run`.
///
/// `completed + failed_terminal + not_attempted.len() + interrupted.len()`
/// always equals `total_submitted`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: SystemTime,
    pub total_submitted: usize,
    pub completed: usize,
    pub failed_terminal: usize,
    /// Never dispatched (cancelled runs only).
    pub not_attempted: Vec<String>,
    /// Failed at least once and were waiting for a retry when the run was cancelled.
    pub interrupted: Vec<String>,
    /// Body bytes received over the network.
    pub total_bytes: u64,
    pub elapsed_ms: u64,
    /// Bytes per second over the whole run.
    pub average_speed: f64,
    pub peak_active: usize,
    pub cancelled: bool,
    /// Every task in submission order with its final state and attempt history.
    pub tasks: Vec<DownloadTask>,
}

impl RunSummary {
    /// True when every submitted task completed.
    pub fn is_success(&self) -> bool {
        self.completed == self.total_submitted
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &DownloadTask> {
        self.tasks
            .iter()
            .filter(|t| t.status == crate::task::TaskStatus::FailedTerminal)
    }
}
