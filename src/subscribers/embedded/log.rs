//! # Logging subscriber.
//!
//! [`LogWriter`] forwards bus events to `tracing`, one line per event:
//!
//! ```text
//! INFO  unit=fetch status=running           unit started
//! WARN  unit=fetch attempt=1 timeout_ms=50  attempt timed out
//! WARN  unit=fetch attempt=1 delay_ms=100   retry scheduled
//! ERROR unit=fetch reason="boom"            unit failed
//! DEBUG milestone=unit:fetch:completed      milestone
//! ```
//!
//! Attach it with `bus.on_any(Arc::new(LogWriter))` or through
//! [`EngineBuilder::with_logging`](crate::EngineBuilder::with_logging).

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Structured `tracing` output for every runtime event.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let unit = e.unit.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::Start => info!(unit, "unit started"),
            EventKind::Complete => info!(unit, elapsed_ms = e.delay_ms, "unit completed"),
            EventKind::Error => error!(unit, reason = e.reason.as_deref(), "unit failed"),
            EventKind::StatusChanged => {
                info!(unit, status = e.status.map(|s| s.as_label()), "status changed")
            }
            EventKind::Skipped => info!(unit, reason = e.reason.as_deref(), "unit skipped"),
            EventKind::Milestone => debug!(milestone = e.milestone.as_deref(), "milestone"),
            EventKind::AttemptFailed => warn!(
                unit,
                attempt = e.attempt,
                reason = e.reason.as_deref(),
                "attempt failed"
            ),
            EventKind::TimeoutHit => warn!(
                unit,
                attempt = e.attempt,
                timeout_ms = e.timeout_ms,
                "attempt timed out"
            ),
            EventKind::BackoffScheduled => warn!(
                unit,
                attempt = e.attempt,
                delay_ms = e.delay_ms,
                "retry scheduled"
            ),
            EventKind::TaskQueued => {
                debug!(task = unit, arrangement = e.arrangement_id, "task queued")
            }
            EventKind::TaskAssigned => debug!(task = unit, slot = e.slot, "task assigned"),
            EventKind::TaskReleased => debug!(
                task = unit,
                slot = e.slot,
                reason = e.reason.as_deref(),
                "slot released"
            ),
            EventKind::SubscriberPanicked => {
                error!(subscriber = unit, reason = e.reason.as_deref(), "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
