//! Background work queue contracts and retry policy.
//!
//! # Responsibility
//! - Define the task kinds emitted by ledgers and the conference service.
//! - Separate enqueueing (`WorkQueue`) from execution (`TaskHandler`).
//! - Provide the exponential backoff policy shared by every consumer.
//!
//! # Invariants
//! - Delivery is at-least-once; handlers must be idempotent.
//! - Handler exhaustion is logged by the consumer and never reaches the
//!   request that enqueued the task.

pub mod pending;
pub mod worker;

use crate::error::ConferenceResult;
use crate::model::ConferenceId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub use pending::{DrainReport, PendingQueue};
pub use worker::{
    spawn_announcement_refresh, spawn_worker, AnnouncementRefresher, BackgroundQueue, TaskReceiver,
    WorkerStats,
};

/// Unit of deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    RecomputeTopSessions(ConferenceId),
    RecomputeFeaturedSpeakers(ConferenceId),
    SendConfirmationEmail {
        email: String,
        conference_id: ConferenceId,
        conference_name: String,
    },
}

impl Task {
    /// Stable task-kind label used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RecomputeTopSessions(_) => "recompute_top_sessions",
            Self::RecomputeFeaturedSpeakers(_) => "recompute_featured_speakers",
            Self::SendConfirmationEmail { .. } => "send_confirmation_email",
        }
    }

    /// Conference the task is about.
    pub fn conference_id(&self) -> ConferenceId {
        match self {
            Self::RecomputeTopSessions(id) | Self::RecomputeFeaturedSpeakers(id) => *id,
            Self::SendConfirmationEmail { conference_id, .. } => *conference_id,
        }
    }
}

/// Enqueue failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The consumer side is gone.
    Closed,
    Poisoned,
}

impl Display for QueueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "work queue is closed"),
            Self::Poisoned => write!(f, "work queue lock poisoned"),
        }
    }
}

impl Error for QueueError {}

/// Producer side of a work queue.
pub trait WorkQueue: Send + Sync {
    fn enqueue(&self, task: Task) -> Result<(), QueueError>;
}

/// Executes one task. Must be idempotent.
pub trait TaskHandler: Send + Sync {
    fn handle(&self, task: &Task) -> ConferenceResult<()>;
}

/// Exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total handler invocations per task, first try included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy without waits, for deterministic draining.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (0-based): `initial * multiplier^retry`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return self.initial_delay.min(self.max_delay);
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{RetryPolicy, Task};
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(30));
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_for_attempt(4), Duration::ZERO);
    }

    #[test]
    fn task_reports_its_conference() {
        let id = Uuid::new_v4();
        assert_eq!(Task::RecomputeTopSessions(id).conference_id(), id);
        assert_eq!(Task::RecomputeFeaturedSpeakers(id).kind(), "recompute_featured_speakers");
    }
}
