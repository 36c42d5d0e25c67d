//! Error types for the `agora-agents` crate.
//!
//! All fallible operations in this crate return [`AgentError`] through
//! the standard [`Result`] type alias.

use agora_types::{AgentId, ItemId};

/// Errors that can occur during agent and inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// No agent with the given id exists in the registry.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// An agent with the given id already exists in the registry.
    #[error("agent with id '{0}' already exists")]
    DuplicateAgent(AgentId),

    /// The inventory lacks the requested quantity of an item.
    #[error("insufficient {item}: requested {requested}, available {available}")]
    InsufficientItems {
        /// The lacking item.
        item: ItemId,
        /// Units requested for removal.
        requested: u32,
        /// Units actually held.
        available: u32,
    },

    /// Adding items would exceed the agent's carrying capacity.
    #[error(
        "cannot add {attempted} {item}: load {current_load} of capacity {capacity}"
    )]
    CapacityExceeded {
        /// The item being added.
        item: ItemId,
        /// Units the caller tried to add.
        attempted: u32,
        /// Total units currently held.
        current_load: u32,
        /// The agent's capacity.
        capacity: u32,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Where the overflow occurred.
        context: String,
    },
}
