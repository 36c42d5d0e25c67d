//! Error types for the `agora-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use agora_types::{ItemId, LocationId, RecipeId};

/// Errors that can occur during world-graph and recipe operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A location was not found in the world graph.
    #[error("location not found: {0}")]
    LocationNotFound(LocationId),

    /// No edge connects the specified locations.
    #[error("no path from {from} to {to}")]
    NoPathBetween {
        /// Origin location.
        from: LocationId,
        /// Destination location.
        to: LocationId,
    },

    /// A recipe was not found in the recipe book.
    #[error("recipe not found")]
    RecipeNotFound(RecipeId),

    /// The inventory lacks a required recipe input.
    #[error("need {required} {item}, have {have}")]
    InsufficientInput {
        /// The missing item.
        item: ItemId,
        /// Units the recipe requires.
        required: u32,
        /// Units the inventory holds.
        have: u32,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}
