//! Agent state and the agent registry for the Agora simulation.
//!
//! # Modules
//!
//! - [`agent`] -- The per-agent state struct and its gauge invariants
//! - [`inventory`] -- Checked inventory arithmetic primitives
//! - [`registry`] -- The registry that owns all agents
//! - [`error`] -- The crate-wide [`AgentError`] type

pub mod agent;
pub mod error;
pub mod inventory;
pub mod registry;

pub use agent::{AgentState, DEFAULT_CAPACITY, default_needs};
pub use error::AgentError;
pub use registry::{AgentRegistry, AgentSpec};
