//! The deterministic tick engine.
//!
//! One tick runs a fixed sequence of phases:
//!
//! 1. scheduled events due at this tick
//! 2. before-tick hooks
//! 3. agent ordering (id order, or a seeded shuffle)
//! 4. per agent: throttle gate, provider call, action execution
//! 5. world-update hooks
//! 6. after-tick hooks (then the snapshot phase)
//! 7. tick statistics and pacing
//! 8. completion callback, then the tick counter increments
//!
//! All simulation state mutates on the engine's thread only. Given the
//! same seed, initial state, and provider decisions, two runs execute
//! agents in the same order and produce the same outcomes; pacing and
//! wall-clock timings are explicitly outside the deterministic surface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use tracing::{debug, info};

use agora_agents::AgentRegistry;
use agora_events::{Event, EventSink, NullSink};
use agora_exec::ActionInterpreter;
use agora_types::{Action, ActionBody, AgentId, EventType, HookPhase, TickStats};
use agora_world::{LocationGraph, RecipeBook};

use crate::control::EngineControl;
use crate::decision::{ActionProvider, DecisionContext};
use crate::error::HookError;
use crate::hooks::{HookContext, HookManager};
use crate::throttle::{RateLimiter, ThrottleVerdict};

/// Bound on retained per-tick statistics.
const MAX_STATS_HISTORY: usize = 1000;

/// Work the engine runs at a scheduled tick.
pub type ScheduledAction =
    Box<dyn FnMut(&mut HookContext<'_>) -> Result<Value, HookError> + Send>;

/// Callback invoked after each completed tick.
pub type TickCallback = Box<dyn FnMut(&TickStats) + Send>;

/// A named piece of work scheduled for a future tick.
pub struct ScheduledEvent {
    name: String,
    at_tick: u64,
    repeat_every: Option<u64>,
    action: ScheduledAction,
}

impl ScheduledEvent {
    /// Run once at `tick`.
    pub fn once(name: impl Into<String>, tick: u64, action: ScheduledAction) -> Self {
        Self {
            name: name.into(),
            at_tick: tick,
            repeat_every: None,
            action,
        }
    }

    /// Run at `start_tick` and every `interval` ticks after.
    pub fn recurring(
        name: impl Into<String>,
        start_tick: u64,
        interval: u64,
        action: ScheduledAction,
    ) -> Self {
        Self {
            name: name.into(),
            at_tick: start_tick,
            repeat_every: Some(interval.max(1)),
            action,
        }
    }
}

impl std::fmt::Debug for ScheduledEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("name", &self.name)
            .field("at_tick", &self.at_tick)
            .field("repeat_every", &self.repeat_every)
            .finish_non_exhaustive()
    }
}

/// Owns all simulation state and advances it tick by tick.
pub struct TickEngine {
    tick: u64,
    agents: AgentRegistry,
    world: LocationGraph,
    interpreter: ActionInterpreter,
    provider: Box<dyn ActionProvider>,
    limiter: RateLimiter,
    hooks: HookManager,
    sink: Box<dyn EventSink>,
    control: Arc<EngineControl>,
    scheduled: Vec<ScheduledEvent>,
    stats_history: VecDeque<TickStats>,
    seed: Option<u64>,
    tick_interval: Duration,
    on_tick_complete: Option<TickCallback>,
    events_this_tick: u64,
}

impl std::fmt::Debug for TickEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickEngine")
            .field("tick", &self.tick)
            .field("agents", &self.agents.len())
            .field("locations", &self.world.node_count())
            .field("seed", &self.seed)
            .field("scheduled", &self.scheduled.len())
            .finish_non_exhaustive()
    }
}

impl TickEngine {
    /// An engine over the given world and population.
    ///
    /// Events are discarded until a sink is attached and ticks are
    /// unpaced until an interval is set.
    pub fn new(
        world: LocationGraph,
        agents: AgentRegistry,
        recipes: RecipeBook,
        provider: Box<dyn ActionProvider>,
    ) -> Self {
        Self {
            tick: 0,
            agents,
            world,
            interpreter: ActionInterpreter::new(recipes),
            provider,
            limiter: RateLimiter::default(),
            hooks: HookManager::new(),
            sink: Box::new(NullSink),
            control: Arc::new(EngineControl::new()),
            scheduled: Vec::new(),
            stats_history: VecDeque::new(),
            seed: None,
            tick_interval: Duration::ZERO,
            on_tick_complete: None,
            events_this_tick: 0,
        }
    }

    /// Shuffle agent order each tick from this seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Deliver events to `sink` instead of discarding them.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the default throttle.
    #[must_use]
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Sleep ticks out to at least this wall-clock duration.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Invoke `callback` after every completed tick.
    #[must_use]
    pub fn on_tick_complete(mut self, callback: TickCallback) -> Self {
        self.on_tick_complete = Some(callback);
        self
    }

    /// The next tick to execute.
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// The agent registry.
    pub const fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// The agent registry, mutable.
    pub const fn agents_mut(&mut self) -> &mut AgentRegistry {
        &mut self.agents
    }

    /// The world graph.
    pub const fn world(&self) -> &LocationGraph {
        &self.world
    }

    /// The world graph, mutable.
    pub const fn world_mut(&mut self) -> &mut LocationGraph {
        &mut self.world
    }

    /// The action interpreter (pending trades live here).
    pub const fn interpreter(&self) -> &ActionInterpreter {
        &self.interpreter
    }

    /// The action interpreter, mutable.
    pub const fn interpreter_mut(&mut self) -> &mut ActionInterpreter {
        &mut self.interpreter
    }

    /// The hook manager, for registering lifecycle hooks.
    pub const fn hooks_mut(&mut self) -> &mut HookManager {
        &mut self.hooks
    }

    /// The provider throttle.
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The provider throttle, mutable.
    pub const fn limiter_mut(&mut self) -> &mut RateLimiter {
        &mut self.limiter
    }

    /// A shareable handle for pausing and stopping runs.
    pub fn control_handle(&self) -> Arc<EngineControl> {
        Arc::clone(&self.control)
    }

    /// Queue a scheduled event.
    pub fn schedule(&mut self, event: ScheduledEvent) {
        debug!(name = %event.name, at_tick = event.at_tick, "event scheduled");
        self.scheduled.push(event);
    }

    /// Cancel every scheduled event with this name.
    ///
    /// Returns `true` when at least one event was removed.
    pub fn cancel_scheduled(&mut self, name: &str) -> bool {
        let before = self.scheduled.len();
        self.scheduled.retain(|event| event.name != name);
        let removed = self.scheduled.len() < before;
        if removed {
            debug!(name, "scheduled event cancelled");
        }
        removed
    }

    /// Execute exactly one tick and return its statistics.
    pub fn execute_tick(&mut self) -> TickStats {
        let started = Instant::now();
        let tick = self.tick;
        self.events_this_tick = 0;
        self.limiter.set_tick(tick);
        self.emit(Event::new(EventType::TickStart, tick));

        // Phase 1: scheduled events.
        self.run_scheduled(tick);

        // Phase 2: before-tick hooks.
        self.fire_phase(HookPhase::BeforeTick, Value::Null);

        // Phase 3: agent ordering.
        let order = self.agent_order(tick);

        // Phase 4: one action per agent.
        let mut agents_processed: u64 = 0;
        let mut actions_executed: u64 = 0;
        let mut actions_succeeded: u64 = 0;
        let mut actions_failed: u64 = 0;
        for agent_id in order {
            if self.agents.get(&agent_id).is_none() {
                // Removed earlier this tick (e.g. by a hook).
                continue;
            }
            agents_processed = agents_processed.saturating_add(1);
            self.fire_phase(
                HookPhase::BeforeAgentAction,
                json!({ "agent_id": agent_id }),
            );

            let action = self.decide(&agent_id, tick);
            let outcome = self.interpreter.execute(&mut self.agents, &self.world, &action);
            actions_executed = actions_executed.saturating_add(1);
            if outcome.succeeded() {
                actions_succeeded = actions_succeeded.saturating_add(1);
            } else {
                actions_failed = actions_failed.saturating_add(1);
            }

            let location = self.agents.get(&agent_id).map(|a| a.location.clone());
            let mut event = Event::new(Self::event_type_for(&action), tick)
                .agent(agent_id.clone())
                .with_data(json!({
                    "result": outcome.result.to_string(),
                    "message": outcome.message,
                }));
            if let Some(location) = location {
                event = event.at_location(location);
            }
            self.emit(event);

            self.fire_phase(
                HookPhase::AfterAgentAction,
                json!({ "agent_id": agent_id, "result": outcome.result.to_string() }),
            );
        }

        // Phase 5: world updates (regeneration and friends).
        self.fire_phase(HookPhase::WorldUpdate, Value::Null);

        // Phase 6: after-tick hooks, then the snapshot point.
        let avg_ms = self.average_tick_duration_ms();
        self.fire_phase(
            HookPhase::AfterTick,
            json!({ "avg_tick_duration_ms": avg_ms }),
        );
        self.fire_phase(HookPhase::Snapshot, Value::Null);

        // Phase 7: statistics; pacing sleep stays outside duration_ms.
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.emit(
            Event::new(EventType::TickEnd, tick).with_data(json!({ "duration_ms": duration_ms })),
        );
        let stats = TickStats {
            tick,
            duration_ms,
            agents_processed,
            actions_executed,
            actions_succeeded,
            actions_failed,
            events_logged: self.events_this_tick,
        };
        if self.tick_interval > Duration::ZERO {
            let elapsed = started.elapsed();
            if elapsed < self.tick_interval {
                std::thread::sleep(self.tick_interval - elapsed);
            }
        }

        // Phase 8: completion callback, then the counter moves.
        if let Some(callback) = self.on_tick_complete.as_mut() {
            callback(&stats);
        }
        self.tick = self.tick.saturating_add(1);
        if self.stats_history.len() >= MAX_STATS_HISTORY {
            self.stats_history.pop_front();
        }
        self.stats_history.push_back(stats.clone());
        stats
    }

    /// Run up to `num_ticks` ticks, bracketed by the simulation
    /// start/end hook phases.
    ///
    /// Honors the control handle: a stop request ends the run at the
    /// next tick boundary, and a paused engine sleeps until resumed.
    pub fn run(&mut self, num_ticks: u64) -> Vec<TickStats> {
        self.fire_phase(HookPhase::SimulationStart, Value::Null);
        self.emit(Event::new(EventType::SimulationStart, self.tick));
        info!(start_tick = self.tick, num_ticks, "simulation run starting");

        let mut collected = Vec::new();
        for _ in 0..num_ticks {
            while self.control.is_paused() && !self.control.stop_requested() {
                std::thread::sleep(Duration::from_millis(25));
            }
            if self.control.stop_requested() {
                info!(tick = self.tick, "stop requested; ending run");
                break;
            }
            collected.push(self.execute_tick());
        }

        self.emit(Event::new(EventType::SimulationEnd, self.tick));
        self.fire_phase(HookPhase::SimulationEnd, Value::Null);
        info!(end_tick = self.tick, ticks_run = collected.len(), "simulation run finished");
        collected
    }

    /// Run until `stop` returns true for a tick's statistics, up to
    /// `max_ticks`.
    pub fn run_until(
        &mut self,
        max_ticks: u64,
        mut stop: impl FnMut(&TickStats) -> bool,
    ) -> Vec<TickStats> {
        self.fire_phase(HookPhase::SimulationStart, Value::Null);
        self.emit(Event::new(EventType::SimulationStart, self.tick));

        let mut collected = Vec::new();
        for _ in 0..max_ticks {
            if self.control.stop_requested() {
                break;
            }
            let stats = self.execute_tick();
            let done = stop(&stats);
            collected.push(stats);
            if done {
                break;
            }
        }

        self.emit(Event::new(EventType::SimulationEnd, self.tick));
        self.fire_phase(HookPhase::SimulationEnd, Value::Null);
        collected
    }

    /// Run `ticks` warmup ticks, bracketed by the warmup hook phases.
    ///
    /// Warmup ticks are ordinary ticks; the phases exist so hooks can
    /// seed state before the main run is measured.
    pub fn warmup(&mut self, ticks: u64) -> Vec<TickStats> {
        self.fire_phase(HookPhase::WarmupStart, Value::Null);
        self.emit(Event::new(EventType::WarmupStart, self.tick));
        let collected = (0..ticks).map(|_| self.execute_tick()).collect();
        self.emit(Event::new(EventType::WarmupEnd, self.tick));
        self.fire_phase(HookPhase::WarmupEnd, Value::Null);
        collected
    }

    /// The most recent tick's statistics.
    pub fn tick_stats(&self) -> Option<&TickStats> {
        self.stats_history.back()
    }

    /// Statistics for one specific tick, if still retained.
    pub fn stats_for(&self, tick: u64) -> Option<&TickStats> {
        self.stats_history.iter().find(|s| s.tick == tick)
    }

    /// The last `n` ticks' statistics, oldest first.
    pub fn recent_stats(&self, n: usize) -> Vec<&TickStats> {
        let skip = self.stats_history.len().saturating_sub(n);
        self.stats_history.iter().skip(skip).collect()
    }

    /// Mean tick duration over retained history, in milliseconds.
    pub fn average_tick_duration_ms(&self) -> f64 {
        if self.stats_history.is_empty() {
            return 0.0;
        }
        let total: f64 = self.stats_history.iter().map(|s| s.duration_ms).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.stats_history.len() as f64;
        total / count
    }

    /// Rewind the engine to tick zero.
    ///
    /// Clears statistics, scheduled events, throttle state, and control
    /// flags; the world, agents, hooks, and pending trades are left as
    /// they are.
    pub fn reset(&mut self) {
        self.tick = 0;
        self.stats_history.clear();
        self.scheduled.clear();
        self.limiter.reset_all();
        self.control.reset();
        info!("engine reset to tick 0");
    }

    fn agent_order(&self, tick: u64) -> Vec<AgentId> {
        let mut ids = self.agents.agent_ids();
        if let Some(seed) = self.seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tick));
            ids.shuffle(&mut rng);
        }
        ids
    }

    /// Obtain this agent's action for the tick.
    ///
    /// Never fails: throttle denials and provider errors both become
    /// idle actions carrying the reason.
    fn decide(&mut self, agent_id: &AgentId, tick: u64) -> Action {
        match self.limiter.can_make_request(agent_id) {
            ThrottleVerdict::Denied { reason } => Action::idle(agent_id.clone(), reason),
            ThrottleVerdict::Allowed => {
                let Some(agent) = self.agents.get(agent_id) else {
                    return Action::idle(agent_id.clone(), "Agent no longer exists");
                };
                let ctx = DecisionContext {
                    tick,
                    agent,
                    world: &self.world,
                    recipes: self.interpreter.recipes(),
                };
                self.limiter.record_request_start(agent_id);
                match self.provider.get_action(&ctx) {
                    Ok(action) => {
                        self.limiter.record_request_success(agent_id);
                        action
                    }
                    Err(e) => {
                        self.limiter.record_request_error(agent_id, &e.to_string());
                        Action::idle(agent_id.clone(), format!("Decision unavailable: {e}"))
                    }
                }
            }
        }
    }

    fn run_scheduled(&mut self, tick: u64) {
        if self.scheduled.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.scheduled);
        let mut keep = Vec::with_capacity(pending.len());
        for mut event in pending.drain(..) {
            if event.at_tick > tick {
                keep.push(event);
                continue;
            }
            let mut ctx = HookContext::new(tick, &mut self.agents, &mut self.world);
            let result = (event.action)(&mut ctx);
            let (ok, detail) = match result {
                Ok(data) => (true, data),
                Err(e) => (false, json!(e.to_string())),
            };
            self.sink.record(
                Event::new(EventType::Info, tick).with_data(json!({
                    "scheduled_event": event.name,
                    "ok": ok,
                    "detail": detail,
                })),
            );
            self.events_this_tick = self.events_this_tick.saturating_add(1);
            if let Some(interval) = event.repeat_every {
                event.at_tick = tick.saturating_add(interval);
                keep.push(event);
            }
        }
        // Events scheduled *by* the ones that just ran.
        keep.append(&mut self.scheduled);
        self.scheduled = keep;
    }

    fn fire_phase(&mut self, phase: HookPhase, data: Value) {
        let mut ctx =
            HookContext::new(self.tick, &mut self.agents, &mut self.world).with_data(data);
        let _results = self.hooks.execute_phase(phase, &mut ctx);
    }

    fn emit(&mut self, event: Event) {
        self.sink.record(event);
        self.events_this_tick = self.events_this_tick.saturating_add(1);
    }

    fn event_type_for(action: &Action) -> EventType {
        match &action.body {
            ActionBody::Move { .. } => EventType::AgentMove,
            ActionBody::Harvest { .. } => EventType::AgentHarvest,
            ActionBody::Craft { .. } => EventType::AgentCraft,
            ActionBody::Message { .. } => EventType::AgentMessage,
            ActionBody::TradeProposal { .. } => EventType::AgentTradePropose,
            ActionBody::AcceptTrade { accept: true, .. } => EventType::AgentTradeAccept,
            ActionBody::AcceptTrade { accept: false, .. } => EventType::AgentTradeReject,
            ActionBody::GroupAction { .. } => EventType::AgentGroupAction,
            ActionBody::Idle { .. } => EventType::AgentIdle,
        }
    }
}
