//! Lifecycle hooks: named extension points in the tick cycle.
//!
//! A hook registers against exactly one [`HookPhase`] and receives
//! mutable access to the world and the agent registry when that phase
//! fires. Hooks are isolated: a hook that returns an error (or is
//! disabled) produces a recorded [`HookResult`] and the tick carries on
//! -- nothing a hook does can abort the simulation.
//!
//! Within a phase, hooks run in descending priority; ties run in
//! registration order.

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use serde_json::{Value, json};
use tracing::{debug, warn};

use agora_agents::AgentRegistry;
use agora_types::{HookPhase, HookResult};
use agora_world::LocationGraph;

use crate::error::HookError;

/// Bound on retained hook results.
const MAX_HISTORY: usize = 1000;

/// What a hook sees when it fires.
pub struct HookContext<'a> {
    /// The tick being processed.
    pub tick: u64,
    /// All agents, mutable.
    pub agents: &'a mut AgentRegistry,
    /// The world graph, mutable.
    pub world: &'a mut LocationGraph,
    /// Phase-specific extras (e.g. the acting agent's id around an
    /// agent action).
    pub data: Value,
}

impl<'a> HookContext<'a> {
    /// A context with no phase extras.
    pub fn new(tick: u64, agents: &'a mut AgentRegistry, world: &'a mut LocationGraph) -> Self {
        Self {
            tick,
            agents,
            world,
            data: Value::Null,
        }
    }

    /// Attach phase extras, consuming and returning the context.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// A named unit of work attached to one lifecycle phase.
pub trait LifecycleHook: Send {
    /// Unique-ish name for logs and history queries.
    fn name(&self) -> &str;

    /// Ordering within the phase; higher runs first. Defaults to 0.
    fn priority(&self) -> i32 {
        0
    }

    /// A disabled hook is skipped (and recorded as skipped).
    fn enabled(&self) -> bool {
        true
    }

    /// Do the work.
    ///
    /// # Errors
    ///
    /// Returns a [`HookError`] on failure; the manager records it and
    /// continues with the next hook.
    fn execute(&mut self, ctx: &mut HookContext<'_>) -> Result<Value, HookError>;
}

struct Registered {
    hook: Box<dyn LifecycleHook>,
    invocations: u64,
}

/// Owns all registered hooks and runs them phase by phase.
#[derive(Default)]
pub struct HookManager {
    hooks: BTreeMap<HookPhase, Vec<Registered>>,
    history: VecDeque<HookResult>,
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<_, _> = self
            .hooks
            .iter()
            .map(|(phase, hooks)| (phase, hooks.len()))
            .collect();
        f.debug_struct("HookManager")
            .field("hooks", &counts)
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl HookManager {
    /// A manager with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for a phase.
    ///
    /// The phase's hooks are re-sorted by descending priority; equal
    /// priorities keep registration order.
    pub fn register(&mut self, phase: HookPhase, hook: Box<dyn LifecycleHook>) {
        debug!(phase = ?phase, hook = hook.name(), priority = hook.priority(), "hook registered");
        let hooks = self.hooks.entry(phase).or_default();
        hooks.push(Registered {
            hook,
            invocations: 0,
        });
        hooks.sort_by_key(|r| std::cmp::Reverse(r.hook.priority()));
    }

    /// Run every hook registered for `phase`, in priority order.
    ///
    /// Always returns one [`HookResult`] per registered hook; failures
    /// and skips are recorded, never propagated.
    pub fn execute_phase(&mut self, phase: HookPhase, ctx: &mut HookContext<'_>) -> Vec<HookResult> {
        let Some(hooks) = self.hooks.get_mut(&phase) else {
            return Vec::new();
        };

        let mut results = Vec::with_capacity(hooks.len());
        for registered in hooks.iter_mut() {
            let enabled = registered.hook.enabled();
            if enabled {
                registered.invocations = registered.invocations.saturating_add(1);
            }
            let hook = &mut registered.hook;
            let result = if enabled {
                let started = Instant::now();
                let outcome = hook.execute(ctx);
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                match outcome {
                    Ok(data) => HookResult {
                        success: true,
                        hook_name: hook.name().to_owned(),
                        phase,
                        duration_ms,
                        error: None,
                        data,
                    },
                    Err(e) => {
                        warn!(phase = ?phase, hook = hook.name(), error = %e, "hook failed");
                        HookResult {
                            success: false,
                            hook_name: hook.name().to_owned(),
                            phase,
                            duration_ms,
                            error: Some(e.to_string()),
                            data: Value::Null,
                        }
                    }
                }
            } else {
                HookResult {
                    success: true,
                    hook_name: hook.name().to_owned(),
                    phase,
                    duration_ms: 0.0,
                    error: None,
                    data: json!({ "skipped": true }),
                }
            };

            if self.history.len() >= MAX_HISTORY {
                self.history.pop_front();
            }
            self.history.push_back(result.clone());
            results.push(result);
        }
        results
    }

    /// Names of the hooks registered for a phase, in execution order.
    pub fn hook_names(&self, phase: HookPhase) -> Vec<&str> {
        self.hooks
            .get(&phase)
            .map(|hooks| hooks.iter().map(|r| r.hook.name()).collect())
            .unwrap_or_default()
    }

    /// Total hooks registered across all phases.
    pub fn hook_count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// How many times the named hook in `phase` has actually run.
    ///
    /// Skipped (disabled) calls do not count; an unknown hook reports 0.
    pub fn invocation_count(&self, phase: HookPhase, name: &str) -> u64 {
        self.hooks
            .get(&phase)
            .and_then(|hooks| hooks.iter().find(|r| r.hook.name() == name))
            .map_or(0, |r| r.invocations)
    }

    /// Remove every hook registered for one phase.
    pub fn clear_phase(&mut self, phase: HookPhase) {
        self.hooks.remove(&phase);
    }

    /// Remove every hook.
    pub fn clear_all(&mut self) {
        self.hooks.clear();
    }

    /// The most recent hook results, newest last, optionally filtered
    /// by phase and capped at `limit`.
    pub fn execution_history(&self, phase: Option<HookPhase>, limit: usize) -> Vec<&HookResult> {
        let filtered: Vec<&HookResult> = self
            .history
            .iter()
            .filter(|r| phase.is_none_or(|p| r.phase == p))
            .collect();
        let skip = filtered.len().saturating_sub(limit);
        filtered.into_iter().skip(skip).collect()
    }
}
