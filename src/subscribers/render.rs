//! # Renderer bridge.
//!
//! Rendering is an external concern: a host implements [`Render`] (console, TUI,
//! web socket...) and attaches it with [`RenderSubscriber`], which translates bus
//! events into `render_unit_status` / `render_milestone` calls.

use async_trait::async_trait;
use serde_json::Value;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::units::UnitStatus;

/// Rendering collaborator.
pub trait Render: Send + Sync + 'static {
    /// A unit changed status; `reason` carries the error text for `error`.
    fn render_unit_status(&self, unit_id: &str, status: UnitStatus, reason: Option<&str>);

    /// A milestone was emitted.
    fn render_milestone(&self, id: &str, payload: &Value);
}

/// Adapts a [`Render`] implementation to the bus.
pub struct RenderSubscriber<R> {
    renderer: R,
}

impl<R: Render> RenderSubscriber<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

#[async_trait]
impl<R: Render> Subscribe for RenderSubscriber<R> {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::Start | EventKind::Complete | EventKind::Error | EventKind::StatusChanged => {
                if let (Some(unit), Some(status)) = (ev.unit.as_deref(), ev.status) {
                    self.renderer
                        .render_unit_status(unit, status, ev.reason.as_deref());
                }
            }
            EventKind::Milestone => {
                if let Some(id) = ev.milestone.as_deref() {
                    let payload = ev.payload.as_deref().unwrap_or(&Value::Null);
                    self.renderer.render_milestone(id, payload);
                }
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "render"
    }
}
