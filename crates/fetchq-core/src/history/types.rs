//! Rows returned by the history database.

use crate::task::TaskStatus;

/// Run identifier.
pub type RunId = i64;

/// One recorded run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: RunId,
    /// Unix seconds.
    pub started_at: i64,
    /// Unix seconds.
    pub finished_at: i64,
    pub total_submitted: i64,
    pub completed: i64,
    pub failed_terminal: i64,
    /// Not attempted plus interrupted tasks of a cancelled run.
    pub unfinished: i64,
    pub total_bytes: i64,
    pub elapsed_ms: i64,
    pub cancelled: bool,
}

/// Final state of one task within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task_id: String,
    pub source_url: String,
    pub destination: String,
    pub status: TaskStatus,
    pub attempts: i64,
    pub final_size: i64,
    pub bytes_received: i64,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}
