//! The immutable event record.
//!
//! Every observable thing that happens during a run -- an action, a
//! tick boundary, a lifecycle transition -- can be offered to the event
//! sink as one [`Event`]. Events are append-only and never mutated
//! after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agora_types::{AgentId, EventType, LocationId};

/// One immutable record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Time-ordered unique identifier.
    pub id: Uuid,
    /// What kind of thing happened.
    pub event_type: EventType,
    /// The tick during which it happened.
    pub tick: u64,
    /// Wall-clock time of the record.
    pub timestamp: DateTime<Utc>,
    /// The agent involved, if any.
    pub agent_id: Option<AgentId>,
    /// The location involved, if any.
    pub location_id: Option<LocationId>,
    /// Free-form payload.
    pub data: serde_json::Value,
}

impl Event {
    /// Create an event stamped with a fresh v7 UUID and the current
    /// wall-clock time.
    pub fn new(event_type: EventType, tick: u64) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type,
            tick,
            timestamp: Utc::now(),
            agent_id: None,
            location_id: None,
            data: serde_json::Value::Null,
        }
    }

    /// Attach the acting agent, consuming and returning the event.
    #[must_use]
    pub fn agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    /// Attach the location, consuming and returning the event.
    #[must_use]
    pub fn at_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    /// Attach a payload, consuming and returning the event.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builder_attaches_fields() {
        let event = Event::new(EventType::AgentMove, 7)
            .agent(AgentId::new("a"))
            .at_location(LocationId::new("plains"))
            .with_data(json!({"from_location": "forest"}));
        assert_eq!(event.tick, 7);
        assert_eq!(event.agent_id, Some(AgentId::new("a")));
        assert_eq!(event.location_id, Some(LocationId::new("plains")));
        assert_eq!(event.data["from_location"], json!("forest"));
    }

    #[test]
    fn ids_are_unique_and_time_ordered() {
        let a = Event::new(EventType::TickStart, 0);
        let b = Event::new(EventType::TickEnd, 0);
        assert_ne!(a.id, b.id);
        assert!(a.id < b.id);
    }
}
