//! Shared type definitions for the Agora simulation kernel.
//!
//! This crate is the single source of truth for all types used across the
//! Agora workspace: actions and their wire-format factory, type-safe
//! identifiers, execution outcomes, and the entity structs shared by the
//! interpreter, engine, and hook system.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe string wrappers for all entity identifiers
//! - [`action`] -- The eight action kinds, validation, and channel rules
//! - [`outcome`] -- Structured results of executing one action
//! - [`structs`] -- Pending trades, tick statistics, hook phases, events
//! - [`wire`] -- Conversion from the untrusted provider wire shape

pub mod action;
pub mod ids;
pub mod outcome;
pub mod structs;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use action::{Action, ActionBody, ActionKind, Channel, GroupActionKind};
pub use ids::{AgentId, GroupId, ItemId, LocationId, ProposalId, RecipeId};
pub use outcome::{ActionOutcome, OutcomeKind, SideEffect};
pub use structs::{EventType, HookPhase, HookResult, PendingTrade, TickStats, TradeItem};
pub use wire::WireError;
