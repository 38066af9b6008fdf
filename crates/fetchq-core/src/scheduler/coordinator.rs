//! The scheduling loop.
//!
//! Owns the queue and the active set, hands tasks to a fixed pool of worker
//! threads over per-worker channels and applies the retry policy to every
//! finished attempt. The loop wakes on worker messages, on a short tick for
//! cancellation, or when a delayed retry becomes ready.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::mpsc::Sender;

use crate::config::EngineConfig;
use crate::control::CancelToken;
use crate::error::EngineError;
use crate::event::{AttemptOutcome, EngineEvent, WorkerId, WorkerMessage};
use crate::queue::TaskQueue;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::storage;
use crate::task::{AttemptRecord, DownloadTask, TaskSpec, TaskStatus};
use crate::worker::{spawn_worker, Worker};

use super::active::{ActiveSet, WorkerSlot};
use super::stats::{EngineStatistics, StatisticsAggregator, StatsEvent};
use super::summary::RunSummary;

/// Longest the loop sleeps without checking the cancel token.
const TICK: Duration = Duration::from_millis(100);

/// Worker-to-coordinator channel capacity per worker.
const MESSAGES_PER_WORKER: usize = 16;

/// One run of the download engine.
pub struct Coordinator {
    config: EngineConfig,
    policy: RetryPolicy,
    queue: TaskQueue,
    ids: HashSet<String>,
    /// Submission order, for the summary.
    order: Vec<String>,
    stats: Arc<StatisticsAggregator>,
    cancel: CancelToken,
    events: Option<Sender<EngineEvent>>,
}

/// Live state of `run`; dropped when the run ends.
struct Pool {
    assign: Vec<SyncSender<DownloadTask>>,
    handles: Vec<JoinHandle<()>>,
    idle: Vec<WorkerId>,
    active: ActiveSet,
}

impl Coordinator {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            policy: RetryPolicy::from_config(&config),
            config,
            queue: TaskQueue::new(),
            ids: HashSet::new(),
            order: Vec::new(),
            stats: Arc::new(StatisticsAggregator::new()),
            cancel: CancelToken::new(),
            events: None,
        })
    }

    /// Publish engine events to `tx`. Progress samples are dropped when the
    /// channel is full; task outcomes and the run summary wait for the consumer,
    /// so the receiver must be drained while `run` executes.
    pub fn with_events(mut self, tx: Sender<EngineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Use an externally created cancel token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Shared statistics, readable from any thread while `run` executes.
    pub fn stats_handle(&self) -> Arc<StatisticsAggregator> {
        Arc::clone(&self.stats)
    }

    pub fn statistics(&self) -> EngineStatistics {
        self.stats.snapshot()
    }

    /// Validate and enqueue a batch in order. Nothing is enqueued if any
    /// entry is invalid. Returns the number of tasks added.
    pub fn submit<I>(&mut self, specs: I) -> Result<usize, EngineError>
    where
        I: IntoIterator<Item = TaskSpec>,
    {
        let mut batch = Vec::new();
        let mut batch_ids = HashSet::new();
        for mut spec in specs {
            validate_spec(&spec)?;
            if self.ids.contains(&spec.id) || !batch_ids.insert(spec.id.clone()) {
                return Err(EngineError::InvalidTask {
                    id: spec.id,
                    reason: "duplicate task id".into(),
                });
            }
            if let Some(base) = &self.config.base_dir {
                if spec.destination.is_relative() {
                    spec.destination = base.join(&spec.destination);
                }
            }
            spec.destination = storage::normalize_path(&spec.destination);
            if spec.destination.as_os_str().is_empty() {
                return Err(EngineError::InvalidTask {
                    id: spec.id,
                    reason: "destination names no file".into(),
                });
            }
            batch.push(DownloadTask::from_spec(spec, self.config.max_attempts_per_task));
        }

        let n = batch.len();
        for task in batch {
            self.ids.insert(task.id.clone());
            self.order.push(task.id.clone());
            self.emit(EngineEvent::Submitted {
                task_id: task.id.clone(),
            });
            self.queue.enqueue(task);
        }
        self.stats.record(&StatsEvent::Submitted(n));
        tracing::debug!(count = n, queued = self.queue.len(), "tasks submitted");
        Ok(n)
    }

    /// Run until every task is terminal, or until cancellation once in-flight
    /// attempts have finished. Blocking; call from a thread or `spawn_blocking`.
    pub fn run(mut self) -> Result<RunSummary, EngineError> {
        let started_at = SystemTime::now();
        self.stats.mark_started();

        if let Some(base) = &self.config.base_dir {
            storage::ensure_writable_dir(base).map_err(|source| EngineError::BaseDirectory {
                path: base.clone(),
                source,
            })?;
        }

        let mut finished: Vec<DownloadTask> = Vec::with_capacity(self.order.len());
        let worker_count = self.config.concurrency_limit.min(self.queue.len());
        tracing::info!(
            tasks = self.queue.len(),
            workers = worker_count,
            limit = self.config.concurrency_limit,
            "run started"
        );

        if worker_count > 0 {
            let (results_tx, results_rx) = mpsc::sync_channel(worker_count * MESSAGES_PER_WORKER);
            let mut pool = Pool {
                assign: Vec::with_capacity(worker_count),
                handles: Vec::with_capacity(worker_count),
                idle: (0..worker_count).rev().collect(),
                active: ActiveSet::new(self.config.concurrency_limit),
            };
            for id in 0..worker_count {
                let (tx, rx) = mpsc::sync_channel(1);
                let handle = spawn_worker(Worker::new(id, &self.config), rx, results_tx.clone())
                    .map_err(EngineError::WorkerSpawn)?;
                pool.assign.push(tx);
                pool.handles.push(handle);
            }
            drop(results_tx);

            loop {
                let cancelled = self.cancel.is_cancelled();
                if !cancelled {
                    if let Err(e) = self.dispatch_ready(&mut pool) {
                        tracing::error!(active = pool.active.len(), "aborting run: {}", e);
                        return Err(e);
                    }
                }
                if pool.active.is_empty() && (cancelled || self.queue.is_empty()) {
                    break;
                }

                // Zero means a ready task is blocked on a busy destination; only a
                // worker message can unblock it.
                let wait = self
                    .queue
                    .next_ready_in(Instant::now())
                    .filter(|d| !d.is_zero())
                    .map_or(TICK, |d| d.min(TICK));
                match results_rx.recv_timeout(wait) {
                    Ok(msg) => self.handle_message(msg, &mut pool, &mut finished),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(EngineError::WorkersLost {
                            active: pool.active.len(),
                        })
                    }
                }
            }

            let Pool { assign, handles, .. } = pool;
            drop(assign);
            for handle in handles {
                if handle.join().is_err() {
                    tracing::warn!("worker thread panicked during shutdown");
                }
            }
        }

        Ok(self.finish(started_at, finished))
    }

    /// Hand ready tasks to idle workers while capacity remains.
    fn dispatch_ready(&mut self, pool: &mut Pool) -> Result<(), EngineError> {
        while !pool.idle.is_empty() && pool.active.has_capacity() {
            let active = &pool.active;
            let Some(mut task) = self
                .queue
                .dequeue_next(Instant::now(), |dest| active.owns(dest))
            else {
                break;
            };
            let Some(worker) = pool.idle.pop() else {
                self.queue.enqueue(task);
                break;
            };

            task.attempt_count += 1;
            task.status = TaskStatus::Active;
            task.started_at.get_or_insert_with(SystemTime::now);

            pool.active.insert(WorkerSlot {
                worker,
                task_id: task.id.clone(),
                destination: task.destination.clone(),
                attempt: task.attempt_count,
                started_at: SystemTime::now(),
                reported_bytes: 0,
            })?;
            self.stats.record(&StatsEvent::Dispatched);
            tracing::debug!(
                task_id = %task.id,
                attempt = task.attempt_count,
                worker,
                "dispatch"
            );
            self.emit(EngineEvent::Dispatched {
                task_id: task.id.clone(),
                attempt: task.attempt_count,
                worker,
            });

            if pool.assign[worker].send(task).is_err() {
                return Err(EngineError::WorkersLost {
                    active: pool.active.len(),
                });
            }
        }
        Ok(())
    }

    fn handle_message(
        &mut self,
        msg: WorkerMessage,
        pool: &mut Pool,
        finished: &mut Vec<DownloadTask>,
    ) {
        match msg {
            WorkerMessage::Progress {
                worker,
                task_id,
                sample,
            } => {
                let Some(slot) = pool.active.get_mut(worker) else {
                    return;
                };
                if slot.task_id != task_id {
                    return;
                }
                slot.reported_bytes += sample.bytes_delta;
                self.stats.record(&StatsEvent::Transferred(sample.bytes_delta));
                self.emit(EngineEvent::Progress { task_id, sample });
            }
            WorkerMessage::Finished {
                worker,
                task,
                outcome,
            } => {
                let task = *task;
                pool.idle.push(worker);
                let slot = pool.active.remove(worker).unwrap_or_else(|| {
                    tracing::warn!(task_id = %task.id, worker, "finished message without an active slot");
                    WorkerSlot {
                        worker,
                        task_id: task.id.clone(),
                        destination: task.destination.clone(),
                        attempt: task.attempt_count,
                        started_at: SystemTime::now(),
                        reported_bytes: 0,
                    }
                });
                let unreported = outcome.bytes_received().saturating_sub(slot.reported_bytes);
                if unreported > 0 {
                    self.stats.record(&StatsEvent::Transferred(unreported));
                }
                self.settle(task, outcome, &slot, finished);
            }
        }
    }

    /// Apply an attempt outcome: complete, requeue or fail the task.
    fn settle(
        &mut self,
        mut task: DownloadTask,
        outcome: AttemptOutcome,
        slot: &WorkerSlot,
        finished: &mut Vec<DownloadTask>,
    ) {
        task.attempts.push(AttemptRecord {
            attempt: slot.attempt,
            started_at: slot.started_at,
            elapsed: outcome.elapsed(),
            bytes_received: outcome.bytes_received(),
            error: match &outcome {
                AttemptOutcome::Failed { error, .. } => Some(error.clone()),
                AttemptOutcome::Completed { .. } => None,
            },
        });

        match outcome {
            AttemptOutcome::Completed {
                final_size,
                bytes_received,
                elapsed,
                skipped,
                restarted,
            } => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(SystemTime::now());
                task.bytes_transferred = final_size;
                self.stats.record(&StatsEvent::Completed);
                tracing::info!(
                    task_id = %task.id,
                    attempt = task.attempt_count,
                    final_size,
                    bytes_received,
                    skipped,
                    restarted,
                    "task completed"
                );
                self.emit(EngineEvent::Completed {
                    task_id: task.id.clone(),
                    final_size,
                    bytes_received,
                    elapsed,
                    skipped,
                });
                finished.push(task);
            }
            AttemptOutcome::Failed { error, .. } => {
                let kind = error.kind();
                let message = error.to_string();
                task.last_error = Some(error);
                match self.policy.on_failure(&task) {
                    RetryDecision::Requeue { delay } => {
                        task.status = TaskStatus::FailedRetryable;
                        self.stats.record(&StatsEvent::Requeued);
                        tracing::warn!(
                            task_id = %task.id,
                            attempt = task.attempt_count,
                            max_attempts = task.max_attempts,
                            kind = %kind,
                            delay_ms = delay.as_millis() as u64,
                            "attempt failed, requeueing: {}",
                            message
                        );
                        self.emit(EngineEvent::Failed {
                            task_id: task.id.clone(),
                            attempt: task.attempt_count,
                            kind,
                            message,
                            terminal: false,
                        });
                        self.queue.requeue(task, Instant::now(), delay);
                    }
                    RetryDecision::TerminalFail => {
                        task.status = TaskStatus::FailedTerminal;
                        task.completed_at = Some(SystemTime::now());
                        self.stats.record(&StatsEvent::FailedTerminal);
                        tracing::warn!(
                            task_id = %task.id,
                            attempts = task.attempt_count,
                            kind = %kind,
                            "task failed permanently: {}",
                            message
                        );
                        self.emit(EngineEvent::Failed {
                            task_id: task.id.clone(),
                            attempt: task.attempt_count,
                            kind,
                            message,
                            terminal: true,
                        });
                        finished.push(task);
                    }
                }
            }
        }
    }

    fn finish(mut self, started_at: SystemTime, mut tasks: Vec<DownloadTask>) -> RunSummary {
        let cancelled = self.cancel.is_cancelled();
        let leftovers = self.queue.drain();
        self.stats.record(&StatsEvent::Withdrawn(leftovers.len()));

        let mut not_attempted = Vec::new();
        let mut interrupted = Vec::new();
        for task in &leftovers {
            if task.attempt_count == 0 {
                not_attempted.push(task.id.clone());
            } else {
                interrupted.push(task.id.clone());
            }
        }
        tasks.extend(leftovers);

        let position: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        tasks.sort_by_key(|t| position.get(t.id.as_str()).copied().unwrap_or(usize::MAX));

        let snap = self.stats.snapshot();
        let summary = RunSummary {
            started_at,
            total_submitted: self.order.len(),
            completed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            failed_terminal: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::FailedTerminal)
                .count(),
            not_attempted,
            interrupted,
            total_bytes: snap.total_bytes_transferred,
            elapsed_ms: snap.elapsed.as_millis() as u64,
            average_speed: snap.average_bytes_per_sec,
            peak_active: snap.peak_active,
            cancelled,
            tasks,
        };
        tracing::info!(
            submitted = summary.total_submitted,
            completed = summary.completed,
            failed = summary.failed_terminal,
            not_attempted = summary.not_attempted.len(),
            interrupted = summary.interrupted.len(),
            bytes = summary.total_bytes,
            elapsed_ms = summary.elapsed_ms,
            cancelled,
            "run finished"
        );
        self.emit(EngineEvent::RunComplete(Box::new(summary.clone())));
        summary
    }

    /// Progress and Submitted never wait: a full channel drops them. Every
    /// other event is emitted from `run` and waits for room in the channel.
    fn emit(&self, event: EngineEvent) {
        let Some(tx) = &self.events else { return };
        if matches!(event, EngineEvent::Progress { .. } | EngineEvent::Submitted { .. }) {
            if tx.try_send(event).is_err() {
                tracing::trace!("event channel full or closed; event dropped");
            }
        } else if tx.blocking_send(event).is_err() {
            tracing::trace!("event receiver closed; event dropped");
        }
    }
}

fn validate_spec(spec: &TaskSpec) -> Result<(), EngineError> {
    let invalid = |reason: &str| EngineError::InvalidTask {
        id: spec.id.clone(),
        reason: reason.to_string(),
    };
    if spec.id.trim().is_empty() {
        return Err(invalid("empty task id"));
    }
    if spec.destination.as_os_str().is_empty() {
        return Err(invalid("empty destination"));
    }
    let url = url::Url::parse(&spec.source_url)
        .map_err(|e| invalid(&format!("bad source url: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(&format!("unsupported scheme {:?}", url.scheme())));
    }
    Ok(())
}
