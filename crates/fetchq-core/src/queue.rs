//! Pending tasks in dispatch order.
//!
//! Fresh tasks are FIFO. Requeued tasks go to the back and carry a
//! ready-at instant; `dequeue_next` skips entries that are not ready yet or
//! whose destination is busy, leaving them in place.

use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::task::DownloadTask;

#[derive(Debug)]
struct Entry {
    task: DownloadTask,
    ready_at: Option<Instant>,
}

impl Entry {
    fn is_ready(&self, now: Instant) -> bool {
        self.ready_at.map_or(true, |t| t <= now)
    }
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: VecDeque<Entry>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fresh task; eligible immediately.
    pub fn enqueue(&mut self, task: DownloadTask) {
        self.entries.push_back(Entry {
            task,
            ready_at: None,
        });
    }

    /// Append a failed task; eligible once `delay` has passed since `now`.
    pub fn requeue(&mut self, task: DownloadTask, now: Instant, delay: Duration) {
        self.entries.push_back(Entry {
            task,
            ready_at: Some(now + delay),
        });
    }

    /// Remove and return the first ready task whose destination is not busy.
    pub fn dequeue_next<F>(&mut self, now: Instant, is_busy: F) -> Option<DownloadTask>
    where
        F: Fn(&Path) -> bool,
    {
        let idx = self
            .entries
            .iter()
            .position(|e| e.is_ready(now) && !is_busy(&e.task.destination))?;
        self.entries.remove(idx).map(|e| e.task)
    }

    /// Time until the earliest delayed entry becomes ready; `Some(ZERO)` if
    /// something is ready now, `None` if the queue is empty.
    pub fn next_ready_in(&self, now: Instant) -> Option<Duration> {
        self.entries
            .iter()
            .map(|e| {
                e.ready_at
                    .map_or(Duration::ZERO, |t| t.saturating_duration_since(now))
            })
            .min()
    }

    /// Remove everything, in queue order.
    pub fn drain(&mut self) -> Vec<DownloadTask> {
        self.entries.drain(..).map(|e| e.task).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskSpec;

    fn task(id: &str, dest: &str) -> DownloadTask {
        DownloadTask::from_spec(TaskSpec::new(id, "http://h/f", dest), 3)
    }

    fn ids(q: &mut TaskQueue, now: Instant) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(t) = q.dequeue_next(now, |_| false) {
            out.push(t.id);
        }
        out
    }

    #[test]
    fn fresh_tasks_are_fifo() {
        let mut q = TaskQueue::new();
        for i in 0..4 {
            q.enqueue(task(&format!("t{i}"), &format!("f{i}")));
        }
        assert_eq!(q.len(), 4);
        assert_eq!(ids(&mut q, Instant::now()), ["t0", "t1", "t2", "t3"]);
        assert!(q.is_empty());
    }

    #[test]
    fn requeued_task_goes_to_back_after_delay() {
        let now = Instant::now();
        let mut q = TaskQueue::new();
        q.enqueue(task("a", "a"));
        q.requeue(task("r", "r"), now, Duration::from_millis(50));
        q.enqueue(task("b", "b"));

        assert_eq!(ids(&mut q, now), ["a", "b"]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_ready_in(now), Some(Duration::from_millis(50)));
        assert_eq!(ids(&mut q, now + Duration::from_millis(50)), ["r"]);
    }

    #[test]
    fn busy_destination_is_skipped_and_keeps_position() {
        let now = Instant::now();
        let mut q = TaskQueue::new();
        q.enqueue(task("dup", "same.bin"));
        q.enqueue(task("other", "other.bin"));

        let busy = |p: &Path| p == Path::new("same.bin");
        assert_eq!(q.dequeue_next(now, busy).map(|t| t.id), Some("other".into()));
        assert_eq!(q.dequeue_next(now, busy).map(|t| t.id), None);
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue_next(now, |_| false).map(|t| t.id), Some("dup".into()));
    }

    #[test]
    fn next_ready_in_reports_empty_and_ready() {
        let now = Instant::now();
        let mut q = TaskQueue::new();
        assert_eq!(q.next_ready_in(now), None);
        q.requeue(task("r", "r"), now, Duration::from_secs(5));
        q.enqueue(task("a", "a"));
        assert_eq!(q.next_ready_in(now), Some(Duration::ZERO));
    }

    #[test]
    fn drain_returns_queue_order() {
        let now = Instant::now();
        let mut q = TaskQueue::new();
        q.enqueue(task("a", "a"));
        q.requeue(task("b", "b"), now, Duration::from_secs(60));
        let drained: Vec<_> = q.drain().into_iter().map(|t| t.id).collect();
        assert_eq!(drained, ["a", "b"]);
        assert!(q.is_empty());
    }
}
