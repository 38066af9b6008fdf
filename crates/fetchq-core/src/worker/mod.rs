//! Executes one attempt of one task: plan, open sink, stream, verify size.
//!
//! Workers are plain OS threads running blocking libcurl transfers. A worker
//! never decides about retries; it reports how the attempt ended and hands
//! the task back.

pub(crate) mod handler;

use std::io;
use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use curl::easy::Easy2;

use crate::config::EngineConfig;
use crate::event::{AttemptOutcome, WorkerId, WorkerMessage};
use crate::probe::ProbeOptions;
use crate::resume::{ResumePlan, ResumePlanner};
use crate::retry::{classify_curl_error, TransferError};
use crate::storage::{self, FileSink};
use crate::task::DownloadTask;

use handler::{ProgressReporter, TransferHandler};

/// Curl settings for the body transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    /// Wall-clock limit for the whole GET.
    pub attempt_timeout: Duration,
    /// Receive buffer size hint.
    pub buffer_size: usize,
    pub progress_interval: Duration,
}

impl TransferOptions {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            attempt_timeout: cfg.per_attempt_timeout(),
            buffer_size: cfg.chunk_size_hint_bytes,
            progress_interval: cfg.progress_interval(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Worker {
    id: WorkerId,
    planner: ResumePlanner,
    opts: TransferOptions,
}

impl Worker {
    pub fn new(id: WorkerId, cfg: &EngineConfig) -> Self {
        let probe = ProbeOptions {
            connect_timeout: cfg.connect_timeout(),
            timeout: cfg.probe_timeout(),
        };
        Self {
            id,
            planner: ResumePlanner::new(probe, cfg.resume_enabled),
            opts: TransferOptions::from_config(cfg),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Run one attempt of `task` without progress reporting.
    pub fn execute(&self, task: DownloadTask) -> (DownloadTask, AttemptOutcome) {
        self.execute_reporting(task, None)
    }

    pub(crate) fn execute_reporting(
        &self,
        mut task: DownloadTask,
        progress_tx: Option<SyncSender<WorkerMessage>>,
    ) -> (DownloadTask, AttemptOutcome) {
        let started = Instant::now();
        let reporter =
            ProgressReporter::new(progress_tx, self.id, task.id.clone(), self.opts.progress_interval);
        let outcome = match self.attempt(&mut task, reporter, started) {
            Ok(outcome) => outcome,
            Err((error, bytes_received)) => AttemptOutcome::Failed {
                error,
                bytes_received,
                elapsed: started.elapsed(),
            },
        };
        match &outcome {
            AttemptOutcome::Completed {
                final_size,
                bytes_received,
                skipped,
                ..
            } => tracing::debug!(
                task_id = %task.id,
                worker = self.id,
                final_size,
                bytes_received,
                skipped,
                "attempt completed"
            ),
            AttemptOutcome::Failed { error, .. } => tracing::debug!(
                task_id = %task.id,
                worker = self.id,
                kind = %error.kind(),
                "attempt failed: {}",
                error
            ),
        }
        (task, outcome)
    }

    /// Errors carry the number of body bytes received before the failure.
    fn attempt(
        &self,
        task: &mut DownloadTask,
        reporter: ProgressReporter,
        started: Instant,
    ) -> Result<AttemptOutcome, (TransferError, u64)> {
        let dest = task.destination.clone();
        storage::ensure_parent_dir(&dest).map_err(|e| {
            (
                TransferError::filesystem(format!("create parent of {}", dest.display()), &e),
                0,
            )
        })?;

        let plan = self
            .planner
            .plan(&dest, &task.source_url)
            .map_err(|e| (TransferError::filesystem(format!("stat {}", dest.display()), &e), 0))?;
        if let Some(size) = plan.remote_size {
            task.declared_total_size = Some(size);
        }
        if plan.skip {
            let final_size = plan.local_size.unwrap_or(0);
            task.bytes_transferred = final_size;
            return Ok(AttemptOutcome::Completed {
                final_size,
                bytes_received: 0,
                elapsed: started.elapsed(),
                skipped: true,
                restarted: false,
            });
        }
        tracing::debug!(
            task_id = %task.id,
            start_byte = plan.start_byte,
            remote_size = ?plan.remote_size,
            "attempt planned"
        );

        let sink = FileSink::open(&dest, plan.start_byte)
            .map_err(|e| (TransferError::filesystem(format!("open {}", dest.display()), &e), 0))?;
        task.bytes_transferred = plan.start_byte;

        let handler = TransferHandler::new(sink, plan.start_byte, plan.remote_size, reporter);
        let mut easy = Easy2::new(handler);
        let perform = configure(&mut easy, &task.source_url, &plan, &self.opts)
            .and_then(|()| easy.perform());

        let h = easy.get_mut();
        task.bytes_transferred = h.sink.len();
        let received = h.bytes_received;

        if let Some(err) = h.abort.take() {
            return Err((probe_or(err, &plan, received), received));
        }
        if let Err(e) = perform {
            let err = classify_curl_error(&e, received, self.opts.attempt_timeout);
            return Err((probe_or(err, &plan, received), received));
        }
        // Empty bodies never reach the write callback.
        if let Err(err) = h.check_response() {
            task.bytes_transferred = h.sink.len();
            return Err((probe_or(err, &plan, received), received));
        }
        if h.satisfied {
            let final_size = h.sink.len();
            task.bytes_transferred = final_size;
            task.declared_total_size = Some(final_size);
            return Ok(AttemptOutcome::Completed {
                final_size,
                bytes_received: 0,
                elapsed: started.elapsed(),
                skipped: true,
                restarted: false,
            });
        }
        h.sink
            .sync()
            .map_err(|e| (TransferError::filesystem(format!("sync {}", dest.display()), &e), received))?;

        let final_size = h.sink.len();
        task.bytes_transferred = final_size;
        if let Some(expected) = h.expected_total {
            if final_size != expected {
                return Err((
                    TransferError::StreamInterrupted {
                        received,
                        expected: Some(expected),
                        message: format!("file has {} of {} bytes", final_size, expected),
                    },
                    received,
                ));
            }
            task.declared_total_size = Some(expected);
        }

        Ok(AttemptOutcome::Completed {
            final_size,
            bytes_received: received,
            elapsed: started.elapsed(),
            skipped: false,
            restarted: h.restarted,
        })
    }
}

fn configure(
    easy: &mut Easy2<TransferHandler>,
    url: &str,
    plan: &ResumePlan,
    opts: &TransferOptions,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.attempt_timeout)?;
    if opts.buffer_size > 0 {
        easy.buffer_size(opts.buffer_size)?;
    }
    if plan.is_resume() {
        easy.range(&format!("{}-", plan.start_byte))?;
    }
    Ok(())
}

/// A failure before any body byte, after the probe already failed, is a probe failure.
fn probe_or(err: TransferError, plan: &ResumePlan, received: u64) -> TransferError {
    match &plan.probe_error {
        Some(probe_msg) if received == 0 => TransferError::Probe {
            message: format!("{}; request failed: {}", probe_msg, err),
        },
        _ => err,
    }
}

/// Spawn a worker thread that runs every task received on `assignments`
/// and reports back on `results`. Exits when `assignments` is closed.
pub(crate) fn spawn_worker(
    worker: Worker,
    assignments: Receiver<DownloadTask>,
    results: SyncSender<WorkerMessage>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("fetchq-worker-{}", worker.id()))
        .spawn(move || {
            while let Ok(task) = assignments.recv() {
                let (task, outcome) = worker.execute_reporting(task, Some(results.clone()));
                let msg = WorkerMessage::Finished {
                    worker: worker.id(),
                    task: Box::new(task),
                    outcome,
                };
                if results.send(msg).is_err() {
                    break;
                }
            }
            tracing::trace!(worker = worker.id(), "worker exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FailureKind;
    use crate::task::TaskSpec;

    fn quick_config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.connect_timeout_ms = 300;
        cfg.probe_timeout_ms = 500;
        cfg.per_attempt_timeout_ms = 1_000;
        cfg
    }

    #[test]
    fn unreachable_host_reports_probe_failure() {
        let dir = tempfile::tempdir().unwrap();
        let spec = TaskSpec::new("t", "http://127.0.0.1:9/file", dir.path().join("f.bin"));
        let task = DownloadTask::from_spec(spec, 3);
        let (task, outcome) = Worker::new(0, &quick_config()).execute(task);
        match outcome {
            AttemptOutcome::Failed { error, bytes_received, .. } => {
                assert_eq!(error.kind(), FailureKind::Probe);
                assert_eq!(bytes_received, 0);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(task.bytes_transferred, 0);
    }

    #[test]
    fn uncreatable_parent_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let spec = TaskSpec::new("t", "http://127.0.0.1:9/file", blocker.join("sub/f.bin"));
        let (_, outcome) = Worker::new(0, &quick_config()).execute(DownloadTask::from_spec(spec, 3));
        match outcome {
            AttemptOutcome::Failed { error, .. } => assert_eq!(error.kind(), FailureKind::Filesystem),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
