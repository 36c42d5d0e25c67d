//! Event sinks: where the engine delivers its event stream.
//!
//! The engine only knows the [`EventSink`] trait. Three implementations
//! cover the common cases: a bounded in-memory ring for tests and
//! queries, a JSONL file writer for offline analysis, and a null sink
//! for runs that do not care. A sink failure must never disturb the
//! simulation, so the trait is infallible and the file sink downgrades
//! write errors to log warnings.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use tracing::warn;

use agora_types::{AgentId, EventType};

use crate::error::EventError;
use crate::event::Event;

/// Receives the engine's event stream.
pub trait EventSink: Send {
    /// Record one event.
    fn record(&mut self, event: Event);

    /// Flush any buffered output. The default is a no-op.
    fn flush(&mut self) {}
}

/// A bounded in-memory ring of recent events.
///
/// When full, the oldest event is dropped. Also keeps a running total
/// of everything ever offered, which survives eviction.
#[derive(Debug)]
pub struct MemorySink {
    events: VecDeque<Event>,
    max_events: usize,
    total_recorded: u64,
}

impl MemorySink {
    /// Default ring capacity.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Create a sink holding at most `max_events` events.
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: VecDeque::new(),
            max_events,
            total_recorded: 0,
        }
    }

    /// Create a sink with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// All retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Retained events for one tick.
    pub fn events_for_tick(&self, tick: u64) -> Vec<&Event> {
        self.events.iter().filter(|e| e.tick == tick).collect()
    }

    /// Retained events of one type.
    pub fn events_of_type(&self, event_type: EventType) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Retained events involving one agent.
    pub fn events_for_agent(&self, agent: &AgentId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.agent_id.as_ref() == Some(agent))
            .collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events ever offered, including evicted ones.
    pub const fn total_recorded(&self) -> u64 {
        self.total_recorded
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: Event) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_recorded = self.total_recorded.saturating_add(1);
    }
}

/// Writes events as one JSON object per line.
#[derive(Debug)]
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Create (truncating) the output file.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Io`] when the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventSink for JsonlSink {
    fn record(&mut self, event: Event) {
        // An unwritable event stream must not disturb the simulation.
        match serde_json::to_string(&event) {
            Ok(line) => {
                if let Err(e) = writeln!(self.writer, "{line}") {
                    warn!(error = %e, "failed to write event");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize event"),
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "failed to flush event sink");
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&mut self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_evicts_oldest_when_full() {
        let mut sink = MemorySink::with_capacity(2);
        for tick in 0..3 {
            sink.record(Event::new(EventType::TickStart, tick));
        }
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.total_recorded(), 3);
        let ticks: Vec<u64> = sink.events().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![1, 2]);
    }

    #[test]
    fn memory_sink_filters_by_tick_type_and_agent() {
        let mut sink = MemorySink::new();
        sink.record(Event::new(EventType::TickStart, 0));
        sink.record(Event::new(EventType::AgentIdle, 0).agent(AgentId::new("a")));
        sink.record(Event::new(EventType::AgentIdle, 1).agent(AgentId::new("b")));

        assert_eq!(sink.events_for_tick(0).len(), 2);
        assert_eq!(sink.events_of_type(EventType::AgentIdle).len(), 2);
        assert_eq!(sink.events_for_agent(&AgentId::new("a")).len(), 1);
    }

    #[test]
    fn null_sink_accepts_everything() {
        let mut sink = NullSink;
        sink.record(Event::new(EventType::Info, 0));
        sink.flush();
    }
}
