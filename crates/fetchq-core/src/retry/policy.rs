use std::time::Duration;

use crate::config::EngineConfig;
use crate::task::DownloadTask;

/// Decision returned by the retry policy for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back at the end of the queue; eligible again after `delay`.
    Requeue { delay: Duration },
    /// Attempt budget exhausted.
    TerminalFail,
}

/// Attempt budget check plus capped exponential backoff.
///
/// The budget itself lives on each task (`max_attempts`, stamped at submit);
/// the policy only reads it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(cfg.retry.base_delay_ms),
            max_delay: Duration::from_millis(cfg.retry.max_delay_ms),
        }
    }

    /// Delay before re-dispatch after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        // base * 2^(attempt-1), capped.
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    /// Decide what happens to `task` after its latest attempt failed.
    /// `task.attempt_count` counts the attempt that just failed.
    pub fn on_failure(&self, task: &DownloadTask) -> RetryDecision {
        if task.attempts_remaining() > 0 {
            RetryDecision::Requeue {
                delay: self.backoff(task.attempt_count),
            }
        } else {
            RetryDecision::TerminalFail
        }
    }
}
