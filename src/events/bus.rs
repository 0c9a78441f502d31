//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`].
//!
//! ```text
//! Publishers (many):                 Listeners:
//!   Registry   ──┐
//!   Supervisor ──┼──────► Bus ───────► Subscription (kind filter) ──► Subscribe::on_event
//!   WorkerPool ──┤  (broadcast chan)  Subscription (catch-all)   ──► Subscribe::on_event
//!   Milestones ──┘                    raw Receiver (tests, hosts)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits for listeners.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: events are lost if nobody listens at send time.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::event::{Event, EventKind};
use crate::subscribers::{EventFilter, Subscribe, Subscription};

/// Broadcast channel for runtime events; cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a raw receiver observing subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Delivers events of one kind to `sub` until the returned handle is dropped.
    ///
    /// Must be called inside a tokio runtime.
    pub fn on(&self, kind: EventKind, sub: Arc<dyn Subscribe>) -> Subscription {
        Subscription::spawn(self, EventFilter::Kind(kind), sub)
    }

    /// Delivers every event to `sub` until the returned handle is dropped.
    ///
    /// Must be called inside a tokio runtime.
    pub fn on_any(&self, sub: Arc<dyn Subscribe>) -> Subscription {
        Subscription::spawn(self, EventFilter::All, sub)
    }

    /// Number of live receivers (raw and subscriptions).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
