//! Run-level errors. Task-local failures live in [`crate::retry::TransferError`]
//! and never abort a run.

use std::path::PathBuf;

/// Conditions that stop `Coordinator::run` (or reject a submission) as a whole.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid task {id:?}: {reason}")]
    InvalidTask { id: String, reason: String },

    /// The shared base directory cannot be created or written.
    #[error("base directory {} is unusable: {source}", path.display())]
    BaseDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Internal invariant breach: more Active tasks than the configured limit.
    #[error("concurrency limit violated: {active} active task(s) with limit {limit}")]
    ConcurrencyLimitViolation { active: usize, limit: usize },

    /// Internal invariant breach: two Active tasks writing the same file.
    #[error("destination {} is already owned by an active task", path.display())]
    DestinationInUse { path: PathBuf },

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("worker pool exited with {active} task(s) still active")]
    WorkersLost { active: usize },
}
