use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::Engine;
use crate::events::Bus;
use crate::subscribers::{EventFilter, LogWriter, Render, RenderSubscriber, Subscribe, Subscription};

/// Builder wiring subscribers into an [`Engine`] before the first event is published.
pub struct EngineBuilder {
    cfg: EngineConfig,
    subscribers: Vec<(EventFilter, Arc<dyn Subscribe>)>,
}

impl EngineBuilder {
    /// Empty builder over `cfg`.
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Adds a subscriber for the events matching `filter`.
    pub fn with_subscriber(mut self, filter: EventFilter, sub: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push((filter, sub));
        self
    }

    /// Adds the [`LogWriter`] for every event.
    pub fn with_logging(self) -> Self {
        self.with_subscriber(EventFilter::All, Arc::new(LogWriter))
    }

    /// Bridges status and milestone events to `renderer`.
    pub fn with_renderer(self, renderer: impl Render) -> Self {
        self.with_subscriber(EventFilter::All, Arc::new(RenderSubscriber::new(renderer)))
    }

    /// Builds the engine; must be called inside a tokio runtime when subscribers
    /// were added.
    pub fn build(self) -> Engine {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subscriptions = self
            .subscribers
            .into_iter()
            .map(|(filter, sub)| Subscription::spawn(&bus, filter, sub))
            .collect();
        Engine::with_bus(self.cfg, bus, subscriptions)
    }
}
