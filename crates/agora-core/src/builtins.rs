//! Stock lifecycle hooks shipped with the engine.
//!
//! These cover the maintenance work every simulation needs: resource
//! regeneration, need decay, probabilistic inventory spoilage, periodic
//! snapshots, and a stability check. Each is an ordinary
//! [`LifecycleHook`]; callers register them at whichever phase suits
//! their run (the conventional phases are noted per hook).

use std::collections::BTreeMap;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use agora_types::{AgentId, ItemId, LocationId};
use agora_world::regenerate;

use crate::error::HookError;
use crate::hooks::{HookContext, LifecycleHook};

/// Regrows location resources each world-update phase.
///
/// Conventionally registered at [`HookPhase::WorldUpdate`].
///
/// [`HookPhase::WorldUpdate`]: agora_types::HookPhase::WorldUpdate
#[derive(Debug, Clone)]
pub struct ResourceRegenerationHook {
    rates: BTreeMap<ItemId, u32>,
    ceilings: BTreeMap<ItemId, u32>,
}

impl ResourceRegenerationHook {
    /// Regenerate `rates` per tick, clamped to `ceilings`.
    ///
    /// A resource with no ceiling entry grows without bound.
    pub const fn new(rates: BTreeMap<ItemId, u32>, ceilings: BTreeMap<ItemId, u32>) -> Self {
        Self { rates, ceilings }
    }
}

impl LifecycleHook for ResourceRegenerationHook {
    fn name(&self) -> &str {
        "resource_regeneration"
    }

    fn execute(&mut self, ctx: &mut HookContext<'_>) -> Result<Value, HookError> {
        let cells = regenerate(ctx.world, &self.rates, &self.ceilings);
        Ok(json!({ "cells_regenerated": cells }))
    }
}

/// Lowers agent need gauges by a fixed rate each tick.
///
/// Conventionally registered at [`HookPhase::AfterTick`] with a high
/// priority so gauges drop before anything reads them.
///
/// [`HookPhase::AfterTick`]: agora_types::HookPhase::AfterTick
#[derive(Debug, Clone)]
pub struct NeedDecayHook {
    rates: BTreeMap<String, f64>,
}

impl NeedDecayHook {
    /// Decay with explicit per-need rates.
    pub const fn new(rates: BTreeMap<String, f64>) -> Self {
        Self { rates }
    }
}

impl Default for NeedDecayHook {
    /// The stock rates: food drops fastest, shelter at half speed.
    fn default() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert("food".to_owned(), 1.0);
        rates.insert("shelter".to_owned(), 0.5);
        Self { rates }
    }
}

impl LifecycleHook for NeedDecayHook {
    fn name(&self) -> &str {
        "need_decay"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn execute(&mut self, ctx: &mut HookContext<'_>) -> Result<Value, HookError> {
        let mut agents_decayed: u64 = 0;
        for agent in ctx.agents.agents_mut() {
            for (need, rate) in &self.rates {
                agent.decay_need(need, *rate);
            }
            agents_decayed = agents_decayed.saturating_add(1);
        }
        Ok(json!({ "agents_decayed": agents_decayed }))
    }
}

/// Spoils perishable inventory items probabilistically.
///
/// Each tick, every agent holding a perishable item loses one unit of
/// it with the configured probability. Seeded, so runs with the same
/// seed spoil identically.
#[derive(Debug)]
pub struct InventoryDecayHook {
    chances: BTreeMap<ItemId, f64>,
    rng: StdRng,
}

impl InventoryDecayHook {
    /// Spoil each listed item with its per-tick probability.
    pub fn new(chances: BTreeMap<ItemId, f64>, seed: u64) -> Self {
        Self {
            chances,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl LifecycleHook for InventoryDecayHook {
    fn name(&self) -> &str {
        "inventory_decay"
    }

    fn execute(&mut self, ctx: &mut HookContext<'_>) -> Result<Value, HookError> {
        let mut units_spoiled: u64 = 0;
        for agent in ctx.agents.agents_mut() {
            for (item, chance) in &self.chances {
                if agent.held(item) > 0
                    && self.rng.random::<f64>() < *chance
                    && agent.remove_items(item, 1).is_ok()
                {
                    units_spoiled = units_spoiled.saturating_add(1);
                }
            }
        }
        Ok(json!({ "units_spoiled": units_spoiled }))
    }
}

/// A point-in-time copy of one agent's externally visible state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSnapshot {
    /// The tick the snapshot was taken.
    pub tick: u64,
    /// The agent.
    pub agent_id: AgentId,
    /// Display name.
    pub name: String,
    /// Where the agent was.
    pub location: LocationId,
    /// Item holdings.
    pub inventory: BTreeMap<ItemId, u32>,
    /// Need gauges.
    pub needs: BTreeMap<String, f64>,
    /// Skill levels.
    pub skills: BTreeMap<String, f64>,
}

/// Where periodic snapshots go.
pub trait SnapshotSink: Send {
    /// Persist one tick's worth of snapshots.
    ///
    /// # Errors
    ///
    /// Returns a [`HookError`] when the snapshots could not be stored;
    /// the hook manager contains it like any other hook fault.
    fn store(&mut self, tick: u64, snapshots: Vec<AgentSnapshot>) -> Result<(), HookError>;
}

/// Keeps snapshots in memory, newest last.
#[derive(Debug, Default)]
pub struct MemorySnapshotSink {
    batches: Vec<(u64, Vec<AgentSnapshot>)>,
}

impl MemorySnapshotSink {
    /// An empty sink.
    pub const fn new() -> Self {
        Self {
            batches: Vec::new(),
        }
    }

    /// All stored batches, oldest first.
    pub fn batches(&self) -> &[(u64, Vec<AgentSnapshot>)] {
        &self.batches
    }
}

impl SnapshotSink for MemorySnapshotSink {
    fn store(&mut self, tick: u64, snapshots: Vec<AgentSnapshot>) -> Result<(), HookError> {
        self.batches.push((tick, snapshots));
        Ok(())
    }
}

/// Default snapshot interval in ticks.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 100;

/// Captures all agent state every N ticks.
///
/// Conventionally registered at [`HookPhase::Snapshot`], which the
/// engine fires every tick; the hook applies its own interval.
///
/// [`HookPhase::Snapshot`]: agora_types::HookPhase::Snapshot
pub struct SnapshotHook {
    interval: u64,
    sink: Box<dyn SnapshotSink>,
}

impl SnapshotHook {
    /// Snapshot every `interval` ticks into `sink`.
    pub fn new(interval: u64, sink: Box<dyn SnapshotSink>) -> Self {
        Self {
            interval: interval.max(1),
            sink,
        }
    }
}

impl LifecycleHook for SnapshotHook {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn execute(&mut self, ctx: &mut HookContext<'_>) -> Result<Value, HookError> {
        if ctx.tick.checked_rem(self.interval) != Some(0) {
            return Ok(json!({ "skipped_interval": true }));
        }
        let snapshots: Vec<AgentSnapshot> = ctx
            .agents
            .agents()
            .map(|agent| AgentSnapshot {
                tick: ctx.tick,
                agent_id: agent.id.clone(),
                name: agent.name.clone(),
                location: agent.location.clone(),
                inventory: agent.inventory.clone(),
                needs: agent.needs.clone(),
                skills: agent.skills.clone(),
            })
            .collect();
        let count = snapshots.len();
        self.sink.store(ctx.tick, snapshots)?;
        Ok(json!({ "agents_snapshotted": count }))
    }
}

/// Flags runs that look like they are collapsing.
///
/// Reports the population count, every agent with a need gauge at
/// zero, and (when the phase data carries an `avg_tick_duration_ms`
/// reading, as the after-tick phase does) whether ticks are running
/// over budget. The run is "stable" when all checks pass.
#[derive(Debug, Clone)]
pub struct StabilityCheckHook {
    min_agents: usize,
    max_tick_duration_ms: Option<f64>,
}

impl StabilityCheckHook {
    /// Require at least `min_agents` for the run to count as stable.
    pub const fn new(min_agents: usize) -> Self {
        Self {
            min_agents,
            max_tick_duration_ms: None,
        }
    }

    /// Also flag the run when average tick duration exceeds `ms`.
    #[must_use]
    pub const fn with_max_tick_duration_ms(mut self, ms: f64) -> Self {
        self.max_tick_duration_ms = Some(ms);
        self
    }
}

impl LifecycleHook for StabilityCheckHook {
    fn name(&self) -> &str {
        "stability_check"
    }

    fn execute(&mut self, ctx: &mut HookContext<'_>) -> Result<Value, HookError> {
        let agent_count = ctx.agents.len();
        let critical: Vec<String> = ctx
            .agents
            .agents()
            .filter(|agent| agent.needs.values().any(|v| *v <= 0.0))
            .map(|agent| agent.id.to_string())
            .collect();
        let over_budget = match self.max_tick_duration_ms {
            Some(budget) => ctx
                .data
                .get("avg_tick_duration_ms")
                .and_then(Value::as_f64)
                .is_some_and(|avg| avg > budget),
            None => false,
        };
        let stable = agent_count >= self.min_agents && critical.is_empty() && !over_budget;
        if !stable {
            warn!(
                tick = ctx.tick,
                agent_count,
                critical_agents = critical.len(),
                over_budget,
                "stability check failed"
            );
        }
        Ok(json!({
            "stable": stable,
            "agent_count": agent_count,
            "critical_agents": critical,
            "over_budget": over_budget,
        }))
    }
}
