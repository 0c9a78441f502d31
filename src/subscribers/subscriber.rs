//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging handlers into the bus.
//! Each subscriber attached through [`Bus::on`](crate::Bus::on) or
//! [`Bus::on_any`](crate::Bus::on_any) gets:
//! - a **dedicated listener task** (runs independently of publishers)
//! - **FIFO delivery** of the events it is interested in
//! - **panic isolation** (panics are reported as `EventKind::SubscriberPanicked`)
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use flowvisor::{Event, EventKind, Subscribe};
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::Error {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "alerts" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally.
/// - A slow subscriber lags on its own receiver and may skip old events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Subscriber name used in logs and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Closure-backed subscriber for quick hooks.
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use flowvisor::{Bus, EventKind, SubscribeFn};
///
/// let bus = Bus::new(16);
/// let _sub = bus.on(EventKind::Error, SubscribeFn::arc("errors", |ev| {
///     eprintln!("unit {:?} failed: {:?}", ev.unit, ev.reason);
/// }));
/// # }
/// ```
pub struct SubscribeFn<F> {
    name: &'static str,
    f: F,
}

impl<F> SubscribeFn<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    pub fn arc(name: &'static str, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F> Subscribe for SubscribeFn<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &Event) {
        (self.f)(event)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
