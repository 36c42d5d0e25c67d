//! The Agora simulation kernel: tick engine, throttling, and hooks.
//!
//! This crate ties the domain crates together into a runnable
//! simulation. The [`TickEngine`] owns all mutable state and advances
//! it through a fixed phase sequence; an [`ActionProvider`] supplies
//! agent decisions from behind a [`RateLimiter`]; a [`HookManager`]
//! runs registered [`LifecycleHook`]s at each extension point; and
//! [`SimulationConfig`] assembles the whole thing from one YAML
//! document.
//!
//! # Modules
//!
//! - [`engine`] -- The deterministic tick loop and scheduled events
//! - [`decision`] -- The action-provider seam and its errors
//! - [`throttle`] -- Rate limiting and the night-mode circuit breaker
//! - [`hooks`] -- Lifecycle hook trait and manager
//! - [`builtins`] -- Stock hooks (regeneration, decay, snapshots)
//! - [`control`] -- Pause/stop flags shared with operators
//! - [`config`] -- Typed YAML run configuration
//! - [`error`] -- Configuration and hook errors

pub mod builtins;
pub mod config;
pub mod control;
pub mod decision;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod throttle;

pub use builtins::{
    AgentSnapshot, InventoryDecayHook, MemorySnapshotSink, NeedDecayHook,
    ResourceRegenerationHook, SnapshotHook, SnapshotSink, StabilityCheckHook,
};
pub use config::{AgentSeed, EngineSettings, RegenSettings, SimulationConfig, WorldConfig};
pub use control::EngineControl;
pub use decision::{ActionProvider, DecisionContext, IdleProvider, ProviderError};
pub use engine::{ScheduledAction, ScheduledEvent, TickCallback, TickEngine};
pub use error::{CoreError, HookError};
pub use hooks::{HookContext, HookManager, LifecycleHook};
pub use throttle::{
    ManualClock, RateLimiter, SystemClock, ThrottleConfig, ThrottleVerdict, TimeSource,
};
