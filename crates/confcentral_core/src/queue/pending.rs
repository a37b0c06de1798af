//! In-process FIFO queue drained explicitly by its owner.
//!
//! Used by the CLI (drained before exit) and by tests that need
//! deterministic control over when background work runs.

use super::{QueueError, RetryPolicy, Task, TaskHandler, WorkQueue};
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;

/// Outcome of one [`PendingQueue::drain_with`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    /// Tasks dropped after exhausting every attempt.
    pub failed: usize,
}

/// Mutex-guarded task FIFO.
#[derive(Debug, Default)]
pub struct PendingQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map_or(0, |tasks| tasks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the queued tasks without removing them.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Runs queued tasks in FIFO order until the queue is empty.
    ///
    /// Tasks enqueued by handlers during the drain are processed in the same
    /// pass. Failed handlers are retried per `policy`, sleeping between
    /// attempts.
    pub fn drain_with(&self, handler: &dyn TaskHandler, policy: &RetryPolicy) -> DrainReport {
        let mut report = DrainReport::default();
        while let Some(task) = self.pop() {
            if run_with_retry(handler, policy, &task) {
                report.processed += 1;
            } else {
                report.failed += 1;
            }
        }
        if report.processed > 0 || report.failed > 0 {
            info!(
                "event=queue_drain module=queue status=ok processed={} failed={}",
                report.processed, report.failed
            );
        }
        report
    }

    fn pop(&self) -> Option<Task> {
        // Lock is released before the handler runs; handlers may enqueue.
        self.tasks.lock().ok().and_then(|mut tasks| tasks.pop_front())
    }
}

impl WorkQueue for PendingQueue {
    fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        let mut tasks = self.tasks.lock().map_err(|_| QueueError::Poisoned)?;
        tasks.push_back(task);
        Ok(())
    }
}

/// Returns true when the handler eventually succeeded.
///
/// Only retryable errors are attempted again; any other failure drops the
/// task at once.
pub(crate) fn run_with_retry(handler: &dyn TaskHandler, policy: &RetryPolicy, task: &Task) -> bool {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match handler.handle(task) {
            Ok(()) => return true,
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                warn!(
                    "event=task_retry module=queue status=retry kind={} conference_id={} attempt={attempt} error={err}",
                    task.kind(),
                    task.conference_id()
                );
                thread::sleep(policy.delay_for_attempt(attempt - 1));
            }
            Err(err) => {
                log_exhausted(task, attempt, &err);
                return false;
            }
        }
    }
    false
}

pub(crate) fn log_exhausted(task: &Task, attempts: u32, err: &dyn std::fmt::Display) {
    log::error!(
        "event=task_exhausted module=queue status=error kind={} conference_id={} attempts={attempts} error={err}",
        task.kind(),
        task.conference_id()
    );
}

#[cfg(test)]
mod tests {
    use super::PendingQueue;
    use crate::error::{ConferenceError, ConferenceResult};
    use crate::queue::{RetryPolicy, Task, TaskHandler, WorkQueue};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    struct FlakyHandler {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl TaskHandler for FlakyHandler {
        fn handle(&self, _task: &Task) -> ConferenceResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ConferenceError::Transient("busy".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn retries_until_success() {
        let queue = PendingQueue::new();
        queue.enqueue(Task::RecomputeTopSessions(Uuid::new_v4())).unwrap();
        let handler = FlakyHandler {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        };

        let report = queue.drain_with(&handler, &RetryPolicy::immediate(3));
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn exhaustion_drops_the_task() {
        let queue = PendingQueue::new();
        queue.enqueue(Task::RecomputeFeaturedSpeakers(Uuid::new_v4())).unwrap();
        let handler = FlakyHandler {
            failures_left: AtomicU32::new(10),
            calls: AtomicU32::new(0),
        };

        let report = queue.drain_with(&handler, &RetryPolicy::immediate(2));
        assert_eq!(report.failed, 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert!(queue.is_empty());
    }

    struct MissingConferenceHandler {
        calls: AtomicU32,
    }

    impl TaskHandler for MissingConferenceHandler {
        fn handle(&self, task: &Task) -> ConferenceResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ConferenceError::NotFound(format!(
                "no conference found with key: {}",
                task.conference_id()
            )))
        }
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let queue = PendingQueue::new();
        queue.enqueue(Task::RecomputeTopSessions(Uuid::new_v4())).unwrap();
        queue.enqueue(Task::RecomputeFeaturedSpeakers(Uuid::new_v4())).unwrap();
        let handler = MissingConferenceHandler {
            calls: AtomicU32::new(0),
        };

        let report = queue.drain_with(&handler, &RetryPolicy::immediate(5));
        assert_eq!(report.failed, 2);
        assert_eq!(report.processed, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }
}
