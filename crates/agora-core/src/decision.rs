//! The seam between the kernel and whatever decides agent behavior.
//!
//! The engine never calls a cognition layer directly; it asks an
//! [`ActionProvider`] for one action per agent per tick, handing it a
//! read-only [`DecisionContext`]. Providers are expected to be slow,
//! flaky, or rate-limited (an LLM gateway, a scripted policy, a human
//! console) -- the engine absorbs every provider error by substituting
//! an idle action, so a broken provider degrades the simulation
//! instead of stopping it.

use agora_agents::AgentState;
use agora_types::Action;
use agora_world::{LocationGraph, RecipeBook};
use thiserror::Error;

/// Errors a provider may surface to the engine.
///
/// These never escape the tick loop: the engine records them against
/// the throttle and idles the agent.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider did not answer in time.
    #[error("decision timed out after {timeout_ms}ms")]
    Timeout {
        /// How long the engine waited.
        timeout_ms: u64,
    },

    /// The upstream service refused the request.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Anything else that went wrong inside the provider.
    #[error("provider error: {0}")]
    Internal(String),
}

/// Everything a provider may read while deciding one agent's action.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// The tick being decided.
    pub tick: u64,
    /// The acting agent.
    pub agent: &'a AgentState,
    /// The world graph.
    pub world: &'a LocationGraph,
    /// The recipe book.
    pub recipes: &'a RecipeBook,
}

/// A source of agent decisions, polled once per agent per tick.
pub trait ActionProvider: Send {
    /// Short name for logs and status queries.
    fn name(&self) -> &str;

    /// Decide one action.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when no decision could be produced;
    /// the engine substitutes an idle action and backs off.
    fn get_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Action, ProviderError>;

    /// Decide actions for several agents at once.
    ///
    /// The default polls [`ActionProvider::get_action`] per agent;
    /// batching providers can override this to amortize round trips.
    fn get_actions_batch(
        &mut self,
        contexts: &[DecisionContext<'_>],
    ) -> Vec<Result<Action, ProviderError>> {
        contexts.iter().map(|ctx| self.get_action(ctx)).collect()
    }

    /// Provider-specific metadata about the most recent decision
    /// (model name, token counts, latency), when the provider keeps any.
    fn last_action_metadata(&self) -> Option<serde_json::Value> {
        None
    }
}

/// The no-cognition provider: every agent idles every tick.
///
/// Useful for soak-testing the kernel and as the fallback when no
/// decision layer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleProvider;

impl ActionProvider for IdleProvider {
    fn name(&self) -> &str {
        "idle"
    }

    fn get_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Action, ProviderError> {
        Ok(Action::idle(ctx.agent.id.clone(), "No cognition layer active"))
    }
}
