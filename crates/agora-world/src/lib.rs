//! Geography, resources, and crafting recipes for the Agora simulation.
//!
//! # Modules
//!
//! - [`graph`] -- Location nodes, edges, neighbor lookups, travel cost
//! - [`regen`] -- Clamped resource regeneration over the graph
//! - [`recipes`] -- Crafting recipes and the recipe book
//! - [`error`] -- The crate-wide [`WorldError`] type

pub mod error;
pub mod graph;
pub mod recipes;
pub mod regen;

pub use error::WorldError;
pub use graph::{LocationEdge, LocationGraph, LocationNode};
pub use recipes::{Recipe, RecipeBook};
pub use regen::regenerate;
