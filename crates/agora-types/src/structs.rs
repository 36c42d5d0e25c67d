//! Core entity structs shared across the Agora workspace.
//!
//! Pending trades, tick statistics, hook phases/results, and event
//! types live here so every crate agrees on their shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ItemId, ProposalId};

/// One line of a trade: an item kind and a positive quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeItem {
    /// The item being exchanged.
    pub item_type: ItemId,
    /// How many units.
    pub quantity: u32,
}

impl TradeItem {
    /// Construct a trade line.
    pub fn new(item_type: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_type: item_type.into(),
            quantity,
        }
    }
}

/// A proposed, not-yet-settled two-party item exchange.
///
/// Owned exclusively by the interpreter's trade ledger. Created on a
/// valid `TRADE_PROPOSAL`, destroyed exactly once on accept, reject,
/// cancel, or an expiry sweep. No items are reserved while a trade is
/// pending -- both sides are re-validated at settlement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTrade {
    /// The proposal identifier (ledger key).
    pub proposal_id: ProposalId,
    /// The agent who proposed the trade.
    pub proposer_id: AgentId,
    /// The agent who may accept or reject it.
    pub target_id: AgentId,
    /// Items the proposer gives on settlement.
    pub offered_items: Vec<TradeItem>,
    /// Items the proposer receives on settlement.
    pub requested_items: Vec<TradeItem>,
    /// When the proposal was created.
    pub created_at: DateTime<Utc>,
}

/// Per-tick aggregate counters, immutable after creation.
///
/// Produced once per tick by the engine and retained in a bounded ring
/// buffer for observability queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    /// The tick these counters describe.
    pub tick: u64,
    /// Wall-clock duration of the tick in milliseconds (pacing sleep
    /// excluded -- pacing never affects logical results).
    pub duration_ms: f64,
    /// Number of agents visited this tick.
    pub agents_processed: u64,
    /// Actions handed to the interpreter.
    pub actions_executed: u64,
    /// Actions whose outcome succeeded (`SUCCESS` or `PARTIAL`).
    pub actions_succeeded: u64,
    /// Actions whose outcome did not succeed.
    pub actions_failed: u64,
    /// Events offered to the event sink during the tick.
    pub events_logged: u64,
}

/// The fixed extension points of the tick lifecycle.
///
/// Hooks register against exactly one phase; phases fire in the order
/// documented on the tick engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookPhase {
    /// Before any warmup ticks run.
    WarmupStart,
    /// After warmup ticks complete.
    WarmupEnd,
    /// Start of every tick, before agent actions.
    BeforeTick,
    /// End of every tick, after world updates.
    AfterTick,
    /// Immediately before each agent's action executes.
    BeforeAgentAction,
    /// Immediately after each agent's action executes.
    AfterAgentAction,
    /// The world-update phase (e.g. resource regeneration).
    WorldUpdate,
    /// Once, when the main simulation run begins.
    SimulationStart,
    /// Once, when the main simulation run ends.
    SimulationEnd,
    /// Periodic state snapshot point.
    Snapshot,
}

impl HookPhase {
    /// All phases, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::WarmupStart,
        Self::WarmupEnd,
        Self::BeforeTick,
        Self::AfterTick,
        Self::BeforeAgentAction,
        Self::AfterAgentAction,
        Self::WorldUpdate,
        Self::SimulationStart,
        Self::SimulationEnd,
        Self::Snapshot,
    ];
}

/// The recorded outcome of one hook invocation.
///
/// Produced for every call, including failures -- a hook fault is
/// captured here and never propagated to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    /// Whether the hook ran without error.
    pub success: bool,
    /// The hook's registered name.
    pub hook_name: String,
    /// The phase it ran in.
    pub phase: HookPhase,
    /// Wall-clock duration of the invocation in milliseconds.
    pub duration_ms: f64,
    /// The error message, when `success` is false.
    pub error: Option<String>,
    /// Free-form data reported by the hook.
    pub data: serde_json::Value,
}

/// Classification of events offered to the external event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// An agent was spawned.
    AgentSpawn,
    /// An agent moved between locations.
    AgentMove,
    /// An agent harvested a resource.
    AgentHarvest,
    /// An agent crafted items.
    AgentCraft,
    /// An agent proposed a trade.
    AgentTradePropose,
    /// An agent accepted a trade.
    AgentTradeAccept,
    /// An agent rejected a trade.
    AgentTradeReject,
    /// An agent sent a message.
    AgentMessage,
    /// An agent submitted a group action.
    AgentGroupAction,
    /// An agent idled.
    AgentIdle,
    /// Resources regenerated at a location.
    ResourceRegen,
    /// A tick began.
    TickStart,
    /// A tick completed.
    TickEnd,
    /// The main simulation run began.
    SimulationStart,
    /// The main simulation run ended.
    SimulationEnd,
    /// Warmup began.
    WarmupStart,
    /// Warmup completed.
    WarmupEnd,
    /// A state snapshot was taken.
    Snapshot,
    /// An internal error was observed (and contained).
    Error,
    /// A warning condition.
    Warning,
    /// Informational event.
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_phase_all_is_exhaustive_and_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for phase in HookPhase::ALL {
            assert!(seen.insert(phase));
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn tick_stats_roundtrip_serde() {
        let stats = TickStats {
            tick: 3,
            duration_ms: 1.25,
            agents_processed: 4,
            actions_executed: 4,
            actions_succeeded: 3,
            actions_failed: 1,
            events_logged: 6,
        };
        let json = serde_json::to_string(&stats).ok();
        let back: Option<TickStats> = json.as_deref().and_then(|j| serde_json::from_str(j).ok());
        assert_eq!(back, Some(stats));
    }

    #[test]
    fn pending_trade_roundtrip_serde() {
        let trade = PendingTrade {
            proposal_id: ProposalId::new("p1"),
            proposer_id: AgentId::new("a"),
            target_id: AgentId::new("b"),
            offered_items: vec![TradeItem::new("wheat", 5)],
            requested_items: vec![TradeItem::new("wood", 3)],
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&trade).ok();
        let back: Option<PendingTrade> =
            json.as_deref().and_then(|j| serde_json::from_str(j).ok());
        assert_eq!(back, Some(trade));
    }
}
