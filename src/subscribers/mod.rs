//! # Event subscribers.
//!
//! ```text
//! Registry / Supervisor / WorkerPool ── publish(Event) ──► Bus
//!                                                            │
//!                        ┌───────────────────────────────────┼──────────────────┐
//!                        ▼                                   ▼                  ▼
//!             Subscription(Kind(Error))            Subscription(All)      raw Receiver
//!                        │                                   │
//!                  SubscribeFn / custom            LogWriter / RenderSubscriber
//! ```
//!
//! - [`Subscribe`]: async handler trait
//! - [`Subscription`]: listener task handle; drop or [`Subscription::unsubscribe`] to detach
//! - [`LogWriter`]: `tracing` output
//! - [`Render`] / [`RenderSubscriber`]: bridge to an external renderer

mod embedded;
mod render;
mod subscriber;
mod subscription;

pub use embedded::LogWriter;
pub use render::{Render, RenderSubscriber};
pub use subscriber::{Subscribe, SubscribeFn};
pub use subscription::{EventFilter, Subscription};
