//! # Events emitted by the registry, the supervisor and the worker pool.
//!
//! [`EventKind`] classifies events in four groups:
//! - **Status events**: `Start`, `Complete`, `Error`, `StatusChanged`, `Skipped`
//! - **Milestones**: named payload-carrying notifications (`Milestone`)
//! - **Attempt events**: `AttemptFailed`, `TimeoutHit`, `BackoffScheduled`
//! - **Pool events**: `TaskQueued`, `TaskAssigned`, `TaskReleased`
//!
//! ## Ordering guarantees
//! Each event carries a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use flowvisor::{Event, EventKind, UnitStatus};
//!
//! let ev = Event::new(EventKind::Error)
//!     .with_unit("fetch")
//!     .with_status(UnitStatus::Error)
//!     .with_reason("boom")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.unit.as_deref(), Some("fetch"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::units::UnitStatus;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Status events ===
    /// Unit entered `running`.
    ///
    /// Sets: `unit`, `status`
    Start,

    /// Unit entered `completed`.
    ///
    /// Sets: `unit`, `status`, `delay_ms` (execution time, when known)
    Complete,

    /// Unit entered `error`.
    ///
    /// Sets: `unit`, `status`, `reason` (last error)
    Error,

    /// Unit entered `idle` or `paused`.
    ///
    /// Sets: `unit`, `status`
    StatusChanged,

    /// Worker skipped by the graph scheduler (condition false or bypassed).
    ///
    /// Sets: `unit`, `reason`
    Skipped,

    // === Milestones ===
    /// Named notification.
    ///
    /// Sets: `milestone`, `payload`, `unit` (for unit milestones)
    Milestone,

    // === Attempt events ===
    /// One attempt failed (it may be retried).
    ///
    /// Sets: `unit`, `attempt`, `reason`
    AttemptFailed,

    /// One attempt exceeded its timeout (followed by `AttemptFailed`).
    ///
    /// Sets: `unit`, `attempt`, `timeout_ms`
    TimeoutHit,

    /// Next attempt scheduled after a failure.
    ///
    /// Sets: `unit`, `attempt` (failed attempt), `delay_ms`, `reason`
    BackoffScheduled,

    // === Pool events ===
    /// Task added to the pool queue.
    ///
    /// Sets: `unit` (task name), `attempt` (arrangement id, truncated)
    TaskQueued,

    /// Task bound to a slot and dispatched.
    ///
    /// Sets: `unit` (task name), `slot`
    TaskAssigned,

    /// Slot returned to idle after the task finished.
    ///
    /// Sets: `unit` (task name), `slot`, `reason` (error, if failed)
    TaskReleased,

    // === Subscriber events ===
    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `unit` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Unit id, task name or subscriber name.
    pub unit: Option<Arc<str>>,
    /// New status for status events.
    pub status: Option<UnitStatus>,
    /// Attempt number (1-based).
    pub attempt: Option<u32>,
    /// Attempt timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Backoff delay or execution time in milliseconds.
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, skip causes).
    pub reason: Option<Arc<str>>,
    /// Milestone id.
    pub milestone: Option<Arc<str>>,
    /// Milestone payload.
    pub payload: Option<Arc<Value>>,
    /// Pool slot id.
    pub slot: Option<usize>,
    /// Arrangement id of a queued pool task.
    pub arrangement_id: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            status: None,
            attempt: None,
            timeout_ms: None,
            delay_ms: None,
            reason: None,
            milestone: None,
            payload: None,
            slot: None,
            arrangement_id: None,
        }
    }

    /// Status event matching `status`.
    pub fn for_status(unit: &str, status: UnitStatus) -> Self {
        let kind = match status {
            UnitStatus::Running => EventKind::Start,
            UnitStatus::Completed => EventKind::Complete,
            UnitStatus::Error => EventKind::Error,
            UnitStatus::Idle | UnitStatus::Paused => EventKind::StatusChanged,
        };
        Event::new(kind).with_unit(unit).with_status(status)
    }

    #[inline]
    pub fn with_unit(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[inline]
    pub fn with_status(mut self, status: UnitStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_milestone(mut self, id: impl Into<Arc<str>>, payload: Value) -> Self {
        self.milestone = Some(id.into());
        self.payload = Some(Arc::new(payload));
        self
    }

    #[inline]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    #[inline]
    pub fn with_arrangement(mut self, id: u64) -> Self {
        self.arrangement_id = Some(id);
        self
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_unit(subscriber)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::Start);
        let b = Event::new(EventKind::Start);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn status_maps_to_kind() {
        assert_eq!(Event::for_status("u", UnitStatus::Running).kind, EventKind::Start);
        assert_eq!(Event::for_status("u", UnitStatus::Completed).kind, EventKind::Complete);
        assert_eq!(Event::for_status("u", UnitStatus::Error).kind, EventKind::Error);
        assert_eq!(Event::for_status("u", UnitStatus::Paused).kind, EventKind::StatusChanged);
    }

    #[test]
    fn durations_are_saturated() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
