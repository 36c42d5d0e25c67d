//! Error types for the `agora-exec` crate.
//!
//! Handler-internal faults are represented as [`ExecError`]. They never
//! escape [`crate::ActionInterpreter::execute`]: the boundary converts
//! them into `FAILURE` outcomes with the original message preserved.

use agora_agents::AgentError;
use agora_world::WorldError;

/// Errors raised inside an action handler.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// An agent operation failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// A world-graph or recipe operation failed.
    #[error(transparent)]
    World(#[from] WorldError),
}
