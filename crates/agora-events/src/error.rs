//! Error types for the `agora-events` crate.

/// Errors that can occur while setting up an event sink.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The sink's backing file could not be created or opened.
    #[error("event sink io error: {0}")]
    Io(#[from] std::io::Error),
}
