//! Event records and sinks for the Agora simulation.
//!
//! The engine narrates a run as a stream of immutable [`Event`]s and
//! delivers them to whichever [`EventSink`] it was given. Sinks are
//! infallible by contract: a broken sink degrades to log warnings,
//! never to a failed tick.
//!
//! # Modules
//!
//! - [`event`] -- The immutable event record
//! - [`sink`] -- The sink trait and the memory / JSONL / null sinks
//! - [`error`] -- Sink setup errors

pub mod error;
pub mod event;
pub mod sink;

pub use error::EventError;
pub use event::Event;
pub use sink::{EventSink, JsonlSink, MemorySink, NullSink};
