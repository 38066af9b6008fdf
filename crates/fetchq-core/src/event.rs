//! Messages between workers and the coordinator, and events for callers.

use std::time::{Duration, Instant};

use crate::retry::{FailureKind, TransferError};
use crate::scheduler::RunSummary;
use crate::task::DownloadTask;

pub type WorkerId = usize;

/// Progress of one task at one instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Confirmed size of the destination for the current attempt.
    pub bytes_transferred: u64,
    /// Network bytes since the previous delivered sample.
    pub bytes_delta: u64,
    /// Expected final size, when known.
    pub total: Option<u64>,
    /// Instantaneous rate over the last sample window.
    pub bytes_per_sec: f64,
    pub at: Instant,
}

impl ProgressSample {
    /// Fraction complete in `[0, 1]`, when the total is known and non-zero.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(t) if t > 0 => Some((self.bytes_transferred as f64 / t as f64).min(1.0)),
            _ => None,
        }
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Completed {
        final_size: u64,
        /// Network bytes received in this attempt (0 when skipped).
        bytes_received: u64,
        elapsed: Duration,
        /// Destination already held the full file.
        skipped: bool,
        /// Server ignored the range request and the file was rewritten from 0.
        restarted: bool,
    },
    Failed {
        error: TransferError,
        bytes_received: u64,
        elapsed: Duration,
    },
}

impl AttemptOutcome {
    pub fn bytes_received(&self) -> u64 {
        match self {
            AttemptOutcome::Completed { bytes_received, .. }
            | AttemptOutcome::Failed { bytes_received, .. } => *bytes_received,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            AttemptOutcome::Completed { elapsed, .. } | AttemptOutcome::Failed { elapsed, .. } => {
                *elapsed
            }
        }
    }
}

/// Worker-to-coordinator channel payload. `Finished` is always the last
/// message of an attempt.
#[derive(Debug)]
pub(crate) enum WorkerMessage {
    Progress {
        worker: WorkerId,
        task_id: String,
        sample: ProgressSample,
    },
    Finished {
        worker: WorkerId,
        task: Box<DownloadTask>,
        outcome: AttemptOutcome,
    },
}

/// Events published to an optional caller-supplied channel.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Submitted {
        task_id: String,
    },
    Dispatched {
        task_id: String,
        attempt: u32,
        worker: WorkerId,
    },
    Progress {
        task_id: String,
        sample: ProgressSample,
    },
    Completed {
        task_id: String,
        final_size: u64,
        bytes_received: u64,
        elapsed: Duration,
        skipped: bool,
    },
    Failed {
        task_id: String,
        attempt: u32,
        kind: FailureKind,
        message: String,
        /// No further attempts will be made.
        terminal: bool,
    },
    RunComplete(Box<RunSummary>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_handles_unknown_and_zero_totals() {
        let mut s = ProgressSample {
            bytes_transferred: 50,
            bytes_delta: 50,
            total: Some(200),
            bytes_per_sec: 0.0,
            at: Instant::now(),
        };
        assert_eq!(s.fraction(), Some(0.25));
        s.total = Some(0);
        assert_eq!(s.fraction(), None);
        s.total = None;
        assert_eq!(s.fraction(), None);
    }

    #[test]
    fn outcome_accessors() {
        let ok = AttemptOutcome::Completed {
            final_size: 10,
            bytes_received: 4,
            elapsed: Duration::from_millis(3),
            skipped: false,
            restarted: false,
        };
        assert_eq!(ok.bytes_received(), 4);
        let failed = AttemptOutcome::Failed {
            error: TransferError::Timeout {
                limit: Duration::from_secs(1),
            },
            bytes_received: 7,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(failed.bytes_received(), 7);
        assert_eq!(failed.elapsed(), Duration::from_secs(1));
    }
}
