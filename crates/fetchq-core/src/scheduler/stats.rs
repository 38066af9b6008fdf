//! Lock-free run counters.
//!
//! Every event is O(1) atomic updates; readers take a snapshot at any time
//! from any thread. Rate = total_bytes / elapsed since `mark_started`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// State change reported to the aggregator by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsEvent {
    /// `n` tasks entered the queue.
    Submitted(usize),
    /// Queued task became active.
    Dispatched,
    /// Body bytes received.
    Transferred(u64),
    /// Active task failed and went back to the queue.
    Requeued,
    Completed,
    FailedTerminal,
    /// `n` queued tasks left without running (cancelled run).
    Withdrawn(usize),
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatistics {
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub failed_terminal: usize,
    /// Attempts that were followed by another attempt.
    pub retries: usize,
    pub peak_active: usize,
    pub total_bytes_transferred: u64,
    pub elapsed: Duration,
    /// Bytes per second since run start (0 before start).
    pub average_bytes_per_sec: f64,
}

const NOT_STARTED: u64 = u64::MAX;

#[derive(Debug)]
pub struct StatisticsAggregator {
    origin: Instant,
    /// Nanoseconds from `origin` to run start, or `NOT_STARTED`.
    started_nanos: AtomicU64,
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicUsize,
    failed_terminal: AtomicUsize,
    retries: AtomicUsize,
    peak_active: AtomicUsize,
    total_bytes: AtomicU64,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_dec(counter: &AtomicUsize, n: usize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
        Some(v.saturating_sub(n))
    });
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            started_nanos: AtomicU64::new(NOT_STARTED),
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed_terminal: AtomicUsize::new(0),
            retries: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
            total_bytes: AtomicU64::new(0),
        }
    }

    /// Start the run clock. Later calls are ignored.
    pub fn mark_started(&self) {
        let nanos = self.origin.elapsed().as_nanos().min(u128::from(NOT_STARTED - 1)) as u64;
        let _ = self.started_nanos.compare_exchange(
            NOT_STARTED,
            nanos,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn record(&self, event: &StatsEvent) {
        match *event {
            StatsEvent::Submitted(n) => {
                self.queued.fetch_add(n, Ordering::AcqRel);
            }
            StatsEvent::Dispatched => {
                saturating_dec(&self.queued, 1);
                let now_active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
                self.peak_active.fetch_max(now_active, Ordering::AcqRel);
            }
            StatsEvent::Transferred(bytes) => {
                self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
            }
            StatsEvent::Requeued => {
                saturating_dec(&self.active, 1);
                self.queued.fetch_add(1, Ordering::AcqRel);
                self.retries.fetch_add(1, Ordering::AcqRel);
            }
            StatsEvent::Completed => {
                saturating_dec(&self.active, 1);
                self.completed.fetch_add(1, Ordering::AcqRel);
            }
            StatsEvent::FailedTerminal => {
                saturating_dec(&self.active, 1);
                self.failed_terminal.fetch_add(1, Ordering::AcqRel);
            }
            StatsEvent::Withdrawn(n) => saturating_dec(&self.queued, n),
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self.started_nanos.load(Ordering::Acquire) {
            NOT_STARTED => Duration::ZERO,
            nanos => self
                .origin
                .elapsed()
                .saturating_sub(Duration::from_nanos(nanos)),
        }
    }

    pub fn snapshot(&self) -> EngineStatistics {
        let total = self.total_bytes.load(Ordering::Relaxed);
        let elapsed = self.elapsed();
        let secs = elapsed.as_secs_f64();
        EngineStatistics {
            queued: self.queued.load(Ordering::Acquire),
            active: self.active.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            failed_terminal: self.failed_terminal.load(Ordering::Acquire),
            retries: self.retries.load(Ordering::Acquire),
            peak_active: self.peak_active.load(Ordering::Acquire),
            total_bytes_transferred: total,
            elapsed,
            average_bytes_per_sec: if secs > 0.0 { total as f64 / secs } else { 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lifecycle_counts() {
        let s = StatisticsAggregator::new();
        s.record(&StatsEvent::Submitted(3));
        s.record(&StatsEvent::Dispatched);
        s.record(&StatsEvent::Dispatched);
        s.record(&StatsEvent::Transferred(100));
        s.record(&StatsEvent::Requeued);
        s.record(&StatsEvent::Completed);

        let snap = s.snapshot();
        assert_eq!(snap.queued, 2);
        assert_eq!(snap.active, 0);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.peak_active, 2);
        assert_eq!(snap.total_bytes_transferred, 100);

        s.record(&StatsEvent::Withdrawn(2));
        assert_eq!(s.snapshot().queued, 0);
    }

    #[test]
    fn elapsed_is_zero_until_started() {
        let s = StatisticsAggregator::new();
        s.record(&StatsEvent::Transferred(10));
        let snap = s.snapshot();
        assert_eq!(snap.elapsed, Duration::ZERO);
        assert_eq!(snap.average_bytes_per_sec, 0.0);

        s.mark_started();
        std::thread::sleep(Duration::from_millis(5));
        let snap = s.snapshot();
        assert!(snap.elapsed >= Duration::from_millis(5));
        assert!(snap.average_bytes_per_sec > 0.0);
    }

    #[test]
    fn counters_never_underflow() {
        let s = StatisticsAggregator::new();
        s.record(&StatsEvent::Completed);
        s.record(&StatsEvent::Withdrawn(5));
        let snap = s.snapshot();
        assert_eq!(snap.active, 0);
        assert_eq!(snap.queued, 0);
        assert_eq!(snap.completed, 1);
    }

    #[test]
    fn concurrent_byte_accounting() {
        let s = Arc::new(StatisticsAggregator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        s.record(&StatsEvent::Transferred(3));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(s.snapshot().total_bytes_transferred, 12_000);
    }
}
