//! Runtime events: types, broadcast bus and milestones.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//! - [`Milestones`] emitter for `unit:<id>:<stage>` and free-form milestones
//!
//! ## Quick reference
//! - **Publishers**: `Registry` (status events, milestones), `Supervisor`
//!   (attempt events), `WorkerPool` (pool events), subscription workers (panics).
//! - **Consumers**: [`Subscription`](crate::Subscription)s created via
//!   [`Bus::on`] / [`Bus::on_any`], and raw receivers from [`Bus::subscribe`].

mod bus;
mod event;
mod milestone;

pub use bus::Bus;
pub use event::{Event, EventKind};
pub use milestone::Milestones;
