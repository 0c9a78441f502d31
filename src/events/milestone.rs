//! # Milestone emitter.
//!
//! Milestones are named notifications with a JSON payload, distinct from raw status
//! events. Unit milestones use ids of the form `unit:<unit_id>:<stage>`.

use serde_json::Value;

use super::{Bus, Event, EventKind};

/// Publishes [`EventKind::Milestone`] events on a bus.
#[derive(Clone, Debug)]
pub struct Milestones {
    bus: Bus,
}

impl Milestones {
    pub fn new(bus: Bus) -> Self {
        Self { bus }
    }

    /// Builds the id of a unit milestone.
    ///
    /// ```
    /// assert_eq!(flowvisor::Milestones::unit_id("fetch", "completed"), "unit:fetch:completed");
    /// ```
    pub fn unit_id(unit_id: &str, stage: &str) -> String {
        format!("unit:{unit_id}:{stage}")
    }

    /// Publishes a milestone with an arbitrary id.
    pub fn emit(&self, id: &str, payload: Value) {
        self.bus
            .publish(Event::new(EventKind::Milestone).with_milestone(id, payload));
    }

    /// Publishes `unit:<unit_id>:<stage>` and tags the event with the unit.
    pub fn emit_for_unit(&self, unit_id: &str, stage: &str, payload: Value) {
        self.bus.publish(
            Event::new(EventKind::Milestone)
                .with_unit(unit_id)
                .with_milestone(Self::unit_id(unit_id, stage), payload),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unit_milestone_carries_id_and_payload() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let milestones = Milestones::new(bus);

        milestones.emit_for_unit("fetch", "downloaded", json!({ "bytes": 42 }));
        milestones.emit("release", Value::Null);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::Milestone);
        assert_eq!(ev.milestone.as_deref(), Some("unit:fetch:downloaded"));
        assert_eq!(ev.unit.as_deref(), Some("fetch"));
        assert_eq!(ev.payload.as_deref(), Some(&json!({ "bytes": 42 })));

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.milestone.as_deref(), Some("release"));
        assert!(ev.unit.is_none());
    }
}
