//! Task records: caller input (`TaskSpec`) and the engine-owned `DownloadTask`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::retry::{FailureKind, TransferError};

/// One entry of a submitted batch. URL and destination are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    #[serde(alias = "url")]
    pub source_url: String,
    #[serde(alias = "path")]
    pub destination: PathBuf,
    /// Size hint from the caller; replaced by the probed size once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_size: Option<u64>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            destination: destination.into(),
            declared_size: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Active,
    Completed,
    /// Failed with attempts left; waiting in the queue for its backoff to elapse.
    FailedRetryable,
    FailedTerminal,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::FailedRetryable => "failed_retryable",
            TaskStatus::FailedTerminal => "failed_terminal",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => TaskStatus::Queued,
            "active" => TaskStatus::Active,
            "completed" => TaskStatus::Completed,
            "failed_retryable" => TaskStatus::FailedRetryable,
            _ => TaskStatus::FailedTerminal,
        }
    }
}

/// What happened during one attempt of a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: SystemTime,
    pub elapsed: Duration,
    /// Body bytes received over the network in this attempt.
    pub bytes_received: u64,
    /// `None` when the attempt completed.
    pub error: Option<TransferError>,
}

impl AttemptRecord {
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(TransferError::kind)
    }
}

/// Engine-side record of one download. Owned by the coordinator while queued,
/// moved into a worker while active and handed back with the attempt outcome.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadTask {
    pub id: String,
    pub source_url: String,
    pub destination: PathBuf,
    pub declared_total_size: Option<u64>,
    /// Confirmed size of the destination for the current attempt
    /// (resume offset plus bytes received).
    pub bytes_transferred: u64,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub status: TaskStatus,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub last_error: Option<TransferError>,
    pub attempts: Vec<AttemptRecord>,
}

impl DownloadTask {
    pub fn from_spec(spec: TaskSpec, max_attempts: u32) -> Self {
        Self {
            id: spec.id,
            source_url: spec.source_url,
            destination: spec.destination,
            declared_total_size: spec.declared_size,
            bytes_transferred: 0,
            attempt_count: 0,
            max_attempts,
            status: TaskStatus::Queued,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            attempts: Vec::new(),
        }
    }

    /// Network bytes received across all attempts.
    pub fn bytes_received_total(&self) -> u64 {
        self.attempts.iter().map(|a| a.bytes_received).sum()
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt_count)
    }
}
