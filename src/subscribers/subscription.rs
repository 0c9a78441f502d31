//! # Subscriptions: one listener task per attached subscriber.
//!
//! ```text
//! Bus ──► broadcast::Receiver ──► filter(kind | all) ──► sub.on_event()
//!                                                   └─► panic caught → SubscriberPanicked
//! ```
//!
//! ## Rules
//! - The receiver is created before [`Subscription::spawn`] returns: every event
//!   published afterwards is observed.
//! - Dropping the [`Subscription`] (or calling [`Subscription::unsubscribe`]) stops
//!   delivery.
//! - A lagging listener logs how many events it skipped and keeps going.
//!
//! **Warning**: `AssertUnwindSafe` is used, so a subscriber that panics while
//! holding a lock may leave its own state inconsistent.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// Which events a subscription forwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event.
    All,
    /// Only events of this kind.
    Kind(EventKind),
}

impl EventFilter {
    pub fn matches(&self, ev: &Event) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kind(kind) => ev.kind == *kind,
        }
    }
}

/// Unsubscribe handle returned by [`Bus::on`] / [`Bus::on_any`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    name: &'static str,
    filter: EventFilter,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawns the listener task for `sub`.
    pub fn spawn(bus: &Bus, filter: EventFilter, sub: Arc<dyn Subscribe>) -> Self {
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let stop = token.clone();
        let bus = bus.clone();
        let name = sub.name();

        let handle = tokio::spawn(async move {
            loop {
                let ev = tokio::select! {
                    _ = stop.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => ev,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(subscriber = name, skipped, "subscriber lagged behind the bus");
                            continue;
                        }
                    }
                };
                if !filter.matches(&ev) || is_own_panic(&ev, name) {
                    continue;
                }
                let fut = sub.on_event(&ev);
                if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
                    let info = panic_message(panic.as_ref());
                    warn!(subscriber = name, %info, "subscriber panicked");
                    bus.publish(Event::subscriber_panicked(name, info));
                }
            }
        });

        Self {
            name,
            filter,
            token,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn filter(&self) -> EventFilter {
        self.filter
    }

    /// True once the listener task has exited.
    pub fn is_closed(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stops delivery and waits for the listener to exit.
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// A listener never re-delivers the panic report it produced itself.
fn is_own_panic(ev: &Event, name: &str) -> bool {
    ev.kind == EventKind::SubscriberPanicked && ev.unit.as_deref() == Some(name)
}
