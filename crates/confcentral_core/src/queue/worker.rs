//! Tokio-backed background queue and periodic announcement refresher.
//!
//! # Invariants
//! - Handlers run on the blocking pool; the async worker never touches SQLite.
//! - Only `Transient` failures are retried with backoff.
//! - The worker exits once the queue is closed (or every clone dropped) and
//!   the already queued tasks are processed, returning its counters.

use super::pending::log_exhausted;
use super::{QueueError, RetryPolicy, Task, TaskHandler, WorkQueue};
use crate::views::DerivedViews;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Producer half; clones share one sender.
#[derive(Debug, Clone)]
pub struct BackgroundQueue {
    sender: Arc<Mutex<Option<UnboundedSender<Task>>>>,
}

/// Consumer half, handed to [`spawn_worker`].
#[derive(Debug)]
pub struct TaskReceiver {
    receiver: UnboundedReceiver<Task>,
}

/// Counters reported by a finished worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub failed: usize,
}

impl BackgroundQueue {
    /// Creates a connected producer/consumer pair.
    pub fn channel() -> (Self, TaskReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            TaskReceiver { receiver },
        )
    }

    /// Stops accepting tasks for every clone; the worker finishes what is queued.
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

impl WorkQueue for BackgroundQueue {
    fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        let sender = self.sender.lock().map_err(|_| QueueError::Poisoned)?;
        match sender.as_ref() {
            Some(sender) => sender.send(task).map_err(|_| QueueError::Closed),
            None => Err(QueueError::Closed),
        }
    }
}

/// Spawns the consumer loop on the current tokio runtime.
pub fn spawn_worker(
    receiver: TaskReceiver,
    handler: Arc<dyn TaskHandler>,
    policy: RetryPolicy,
) -> JoinHandle<WorkerStats> {
    tokio::spawn(async move {
        let TaskReceiver { mut receiver } = receiver;
        let mut stats = WorkerStats::default();
        info!("event=worker_start module=queue status=ok");

        while let Some(task) = receiver.recv().await {
            if process(&handler, &policy, task).await {
                stats.processed += 1;
            } else {
                stats.failed += 1;
            }
        }

        info!(
            "event=worker_stop module=queue status=ok processed={} failed={}",
            stats.processed, stats.failed
        );
        stats
    })
}

async fn process(handler: &Arc<dyn TaskHandler>, policy: &RetryPolicy, task: Task) -> bool {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let blocking_handler = Arc::clone(handler);
        let blocking_task = task.clone();
        let outcome =
            tokio::task::spawn_blocking(move || blocking_handler.handle(&blocking_task)).await;

        let (failure, retryable) = match outcome {
            Ok(Ok(())) => return true,
            Ok(Err(err)) => (err.to_string(), err.is_retryable()),
            Err(join_err) => (format!("handler panicked: {join_err}"), false),
        };
        if !retryable || attempt == max_attempts {
            log_exhausted(&task, attempt, &failure);
            break;
        }
        warn!(
            "event=task_retry module=queue status=retry kind={} conference_id={} attempt={attempt} error={failure}",
            task.kind(),
            task.conference_id()
        );
        tokio::time::sleep(policy.delay_for_attempt(attempt - 1)).await;
    }
    false
}

/// Handle to a running announcement refresher.
#[derive(Debug)]
pub struct AnnouncementRefresher {
    handle: JoinHandle<()>,
    updates: watch::Receiver<String>,
}

impl AnnouncementRefresher {
    /// Yields the announcement text whenever a refresh changes it; `""` means
    /// no conference is nearly sold out.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.updates.clone()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Recomputes the announcement every `period` until aborted.
///
/// The first recompute runs immediately.
pub fn spawn_announcement_refresh(views: DerivedViews, period: Duration) -> AnnouncementRefresher {
    let period = period.max(Duration::from_millis(1));
    let (publisher, updates) = watch::channel(String::new());
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let tick_views = views.clone();
            match tokio::task::spawn_blocking(move || tick_views.recompute_announcement()).await {
                Ok(Ok(announcement)) => {
                    let text = announcement.unwrap_or_default();
                    publisher.send_if_modified(|current| {
                        if *current == text {
                            return false;
                        }
                        *current = text;
                        true
                    });
                }
                Ok(Err(err)) => {
                    error!("event=announcement_refresh module=queue status=error error={err}");
                }
                Err(join_err) => {
                    error!("event=announcement_refresh module=queue status=error error={join_err}");
                }
            }
        }
    });
    AnnouncementRefresher { handle, updates }
}
