//! The transactional action interpreter.
//!
//! One action in, exactly one [`ActionOutcome`] out. The interpreter
//! validates structure first (INVALID, zero mutation), then dispatches
//! to a per-kind handler that checks its execution-time preconditions
//! before touching any state. Internal faults are caught at the
//! [`ActionInterpreter::execute`] boundary and reported as FAILURE with
//! the original message preserved -- nothing propagates past it.
//!
//! Trade settlement is the delicate part: see
//! [`ActionInterpreter::settle_trade`] for the two-phase protocol.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::debug;

use agora_agents::AgentRegistry;
use agora_types::{
    Action, ActionBody, ActionOutcome, AgentId, Channel, ItemId, OutcomeKind, PendingTrade,
    ProposalId, SideEffect, TradeItem,
};
use agora_world::{LocationGraph, RecipeBook, WorldError};

use crate::error::ExecError;
use crate::ledger::TradeLedger;

/// Total units across a list of trade lines.
fn total_units(items: &[TradeItem]) -> u64 {
    items.iter().map(|i| u64::from(i.quantity)).sum()
}

/// Per-item totals for one side of a trade. Duplicate lines for the
/// same item are summed, so holdings checks cover the whole side.
fn per_item_totals(items: &[TradeItem]) -> BTreeMap<&ItemId, u64> {
    let mut totals: BTreeMap<&ItemId, u64> = BTreeMap::new();
    for item in items {
        let total = totals.entry(&item.item_type).or_insert(0);
        *total = total.saturating_add(u64::from(item.quantity));
    }
    totals
}

/// Validates and applies one action at a time to shared agent and world
/// state. Owns the pending-trade ledger and the recipe book.
#[derive(Debug, Default)]
pub struct ActionInterpreter {
    recipes: RecipeBook,
    ledger: TradeLedger,
}

impl ActionInterpreter {
    /// Create an interpreter with the given recipe book and an empty
    /// trade ledger.
    pub fn new(recipes: RecipeBook) -> Self {
        Self {
            recipes,
            ledger: TradeLedger::new(),
        }
    }

    /// The pending-trade ledger (read-only).
    pub const fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    /// The recipe book.
    pub const fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    /// Pending trades in which the agent is proposer or target.
    pub fn pending_trades_for(&self, agent: &AgentId) -> Vec<&PendingTrade> {
        self.ledger.for_agent(agent)
    }

    /// Cancel a pending trade out-of-band; returns `true` when removed.
    pub fn cancel_pending_trade(&mut self, id: &ProposalId) -> bool {
        self.ledger.cancel(id)
    }

    /// Drop pending trades older than `max_age_secs`; returns how many.
    pub fn clear_expired_trades(
        &mut self,
        now: chrono::DateTime<chrono::Utc>,
        max_age_secs: f64,
    ) -> usize {
        self.ledger.clear_expired(now, max_age_secs)
    }

    /// Execute one action against the shared state.
    ///
    /// Never panics and never returns an error: every path, including
    /// internal handler faults, yields an [`ActionOutcome`].
    pub fn execute(
        &mut self,
        agents: &mut AgentRegistry,
        world: &LocationGraph,
        action: &Action,
    ) -> ActionOutcome {
        let errors = action.validate();
        if !errors.is_empty() {
            return ActionOutcome::invalid(format!("Validation errors: {}", errors.join("; ")));
        }

        let outcome = self
            .dispatch(agents, world, action)
            .unwrap_or_else(|e| ActionOutcome::failure(format!("Handler error: {e}")));

        debug!(
            agent_id = %action.agent_id,
            kind = %action.kind(),
            result = %outcome.result,
            "action executed"
        );
        outcome
    }

    /// Execute a batch of actions in order, one outcome per action.
    pub fn execute_batch(
        &mut self,
        agents: &mut AgentRegistry,
        world: &LocationGraph,
        actions: &[Action],
    ) -> Vec<ActionOutcome> {
        actions
            .iter()
            .map(|action| self.execute(agents, world, action))
            .collect()
    }

    fn dispatch(
        &mut self,
        agents: &mut AgentRegistry,
        world: &LocationGraph,
        action: &Action,
    ) -> Result<ActionOutcome, ExecError> {
        match &action.body {
            ActionBody::Move { destination } => {
                Self::handle_move(agents, world, &action.agent_id, destination.clone())
            }
            ActionBody::Harvest {
                resource_type,
                amount,
            } => Self::handle_harvest(agents, world, &action.agent_id, resource_type, *amount),
            ActionBody::Craft {
                recipe_id,
                quantity,
            } => self.handle_craft(agents, &action.agent_id, recipe_id, *quantity),
            ActionBody::Message {
                recipient_id,
                channel,
                content,
                ..
            } => Ok(Self::handle_message(
                agents,
                &action.agent_id,
                recipient_id.as_ref(),
                *channel,
                content,
            )),
            ActionBody::TradeProposal {
                target_agent_id,
                offered_items,
                requested_items,
                proposal_id,
            } => Ok(self.handle_trade_proposal(
                agents,
                action,
                target_agent_id,
                offered_items,
                requested_items,
                proposal_id,
            )),
            ActionBody::AcceptTrade {
                proposal_id,
                accept,
            } => self.handle_accept_trade(agents, &action.agent_id, proposal_id, *accept),
            ActionBody::GroupAction {
                group_action_type,
                group_id,
                payload,
            } => Ok(Self::handle_group_action(
                agents,
                &action.agent_id,
                *group_action_type,
                group_id.clone(),
                payload.clone(),
            )),
            ActionBody::Idle { reason } => Ok(Self::handle_idle(agents, &action.agent_id, reason)),
        }
    }

    fn handle_move(
        agents: &mut AgentRegistry,
        world: &LocationGraph,
        agent_id: &AgentId,
        destination: agora_types::LocationId,
    ) -> Result<ActionOutcome, ExecError> {
        let Some(agent) = agents.get(agent_id) else {
            return Ok(ActionOutcome::failure(format!("Agent not found: {agent_id}")));
        };
        let current = agent.location.clone();

        if world.get_node(&destination).is_none() {
            return Ok(ActionOutcome::failure(format!(
                "Destination not found: {destination}"
            )));
        }

        // An unplaced agent (empty location) may move anywhere; otherwise
        // the destination must be a neighbor with a traversable edge.
        if !current.is_empty() && current != destination {
            if !world.neighbors(&current).contains(&destination) {
                return Ok(ActionOutcome::failure(format!(
                    "No path from {current} to {destination}"
                )));
            }
            if world.travel_cost(&current, &destination).is_none() {
                return Ok(ActionOutcome::failure(format!(
                    "Path blocked from {current} to {destination}"
                )));
            }
        }

        agents.update_location(agent_id, destination.clone())?;

        Ok(ActionOutcome::success(format!("Moved from {current} to {destination}"))
            .with_change("agent_id", json!(agent_id))
            .with_change("old_location", json!(current))
            .with_change("new_location", json!(destination)))
    }

    fn handle_harvest(
        agents: &mut AgentRegistry,
        world: &LocationGraph,
        agent_id: &AgentId,
        resource: &ItemId,
        amount: u32,
    ) -> Result<ActionOutcome, ExecError> {
        let Some(agent) = agents.get(agent_id) else {
            return Ok(ActionOutcome::failure(format!("Agent not found: {agent_id}")));
        };
        let location = agent.location.clone();
        let space = agent.inventory_space();

        let Some(node) = world.get_node(&location) else {
            return Ok(ActionOutcome::failure("Agent not at valid location"));
        };

        let richness = node.richness(resource);
        if richness == 0 {
            return Ok(ActionOutcome::failure(format!(
                "Resource '{resource}' not available at {}",
                node.name
            )));
        }

        if space == 0 {
            return Ok(ActionOutcome::failure("Inventory full"));
        }

        // The harvest yields as much as the request, the free space, and
        // the local richness all allow.
        let actual = amount.min(space).min(richness);

        if agents
            .adjust_inventory(agent_id, resource, i64::from(actual))
            .is_err()
        {
            return Ok(ActionOutcome::failure("Failed to update inventory"));
        }

        let result = if actual == amount {
            OutcomeKind::Success
        } else {
            OutcomeKind::Partial
        };

        Ok(
            ActionOutcome::bare(result, format!("Harvested {actual} {resource}"))
                .with_change("agent_id", json!(agent_id))
                .with_change("resource_type", json!(resource))
                .with_change("amount_harvested", json!(actual))
                .with_change("location", json!(location)),
        )
    }

    fn handle_craft(
        &self,
        agents: &mut AgentRegistry,
        agent_id: &AgentId,
        recipe_id: &agora_types::RecipeId,
        quantity: u32,
    ) -> Result<ActionOutcome, ExecError> {
        let Some(agent) = agents.get(agent_id) else {
            return Ok(ActionOutcome::failure(format!("Agent not found: {agent_id}")));
        };

        let Some(recipe) = self.recipes.get(recipe_id) else {
            return Ok(ActionOutcome::failure(format!("Unknown recipe: {recipe_id}")));
        };

        match recipe.check_inputs(&agent.inventory, quantity) {
            Ok(()) => {}
            Err(WorldError::InsufficientInput {
                item,
                required,
                have,
            }) => {
                return Ok(ActionOutcome::failure(format!(
                    "Insufficient {item}: need {required}, have {have}"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let net_change = recipe.net_quantity_change(quantity)?;
        if net_change > 0 && i64::from(agent.inventory_space()) < net_change {
            return Ok(ActionOutcome::failure(
                "Insufficient inventory space for crafted items",
            ));
        }

        // Inputs come out before outputs go in, so the capacity check
        // above guarantees the additions cannot fail.
        let mut inputs_consumed = serde_json::Map::new();
        for (item, count) in &recipe.inputs {
            let total = i64::from(*count)
                .checked_mul(i64::from(quantity))
                .ok_or(WorldError::ArithmeticOverflow)?;
            agents.adjust_inventory(agent_id, item, -total)?;
            inputs_consumed.insert(item.to_string(), json!(total));
        }
        let mut outputs_produced = serde_json::Map::new();
        for (item, count) in &recipe.outputs {
            let total = i64::from(*count)
                .checked_mul(i64::from(quantity))
                .ok_or(WorldError::ArithmeticOverflow)?;
            agents.adjust_inventory(agent_id, item, total)?;
            outputs_produced.insert(item.to_string(), json!(total));
        }
        for (skill, gain) in &recipe.skill_gains {
            agents.adjust_skill(agent_id, skill, gain * f64::from(quantity))?;
        }

        Ok(
            ActionOutcome::success(format!("Crafted {quantity}x {recipe_id}"))
                .with_change("agent_id", json!(agent_id))
                .with_change("recipe_id", json!(recipe_id))
                .with_change("quantity", json!(quantity))
                .with_change("inputs_consumed", json!(inputs_consumed))
                .with_change("outputs_produced", json!(outputs_produced)),
        )
    }

    fn handle_message(
        agents: &AgentRegistry,
        agent_id: &AgentId,
        recipient_id: Option<&AgentId>,
        channel: Channel,
        content: &str,
    ) -> ActionOutcome {
        let Some(agent) = agents.get(agent_id) else {
            return ActionOutcome::failure(format!("Agent not found: {agent_id}"));
        };

        if channel == Channel::Direct {
            if let Some(recipient) = recipient_id {
                if agents.get(recipient).is_none() {
                    return ActionOutcome::failure(format!("Recipient not found: {recipient}"));
                }
            }
        }

        ActionOutcome::success(format!("Message queued ({channel})")).with_side_effect(
            SideEffect::Message {
                sender_id: agent_id.clone(),
                recipient_id: recipient_id.cloned(),
                channel: channel.as_str().to_owned(),
                content: content.to_owned(),
                sender_location: agent.location.clone(),
            },
        )
    }

    fn handle_trade_proposal(
        &mut self,
        agents: &AgentRegistry,
        action: &Action,
        target_id: &AgentId,
        offered: &[TradeItem],
        requested: &[TradeItem],
        proposal_id: &ProposalId,
    ) -> ActionOutcome {
        let Some(agent) = agents.get(&action.agent_id) else {
            return ActionOutcome::failure(format!("Agent not found: {}", action.agent_id));
        };

        if agents.get(target_id).is_none() {
            return ActionOutcome::failure(format!("Target agent not found: {target_id}"));
        }

        // Non-binding check: the proposer must hold the offer now, but
        // nothing is reserved until settlement.
        for (item_type, quantity) in per_item_totals(offered) {
            if u64::from(agent.held(item_type)) < quantity {
                return ActionOutcome::failure(format!("Insufficient {item_type} to offer"));
            }
        }

        self.ledger.insert(PendingTrade {
            proposal_id: proposal_id.clone(),
            proposer_id: action.agent_id.clone(),
            target_id: target_id.clone(),
            offered_items: offered.to_vec(),
            requested_items: requested.to_vec(),
            created_at: action.timestamp,
        });

        ActionOutcome::success(format!("Trade proposal created: {proposal_id}"))
            .with_side_effect(SideEffect::TradeProposal {
                proposal_id: proposal_id.clone(),
                proposer_id: action.agent_id.clone(),
                target_id: target_id.clone(),
            })
    }

    fn handle_accept_trade(
        &mut self,
        agents: &mut AgentRegistry,
        agent_id: &AgentId,
        proposal_id: &ProposalId,
        accept: bool,
    ) -> Result<ActionOutcome, ExecError> {
        let Some(trade) = self.ledger.get(proposal_id) else {
            return Ok(ActionOutcome::failure(format!(
                "Trade proposal not found: {proposal_id}"
            )));
        };

        // Authorization failure does not consume the proposal.
        if *agent_id != trade.target_id {
            return Ok(ActionOutcome::failure(
                "Only the target can respond to this trade",
            ));
        }

        if !accept {
            self.ledger.remove(proposal_id);
            return Ok(ActionOutcome::success("Trade rejected"));
        }

        self.settle_trade(agents, proposal_id)
    }

    /// Phase two of the settlement protocol.
    ///
    /// Re-validates both parties' holdings and receiving capacity at
    /// settlement time, because nothing was reserved at proposal time.
    /// Holdings are checked against per-item totals, so a side that
    /// lists the same item on several lines is held to the sum. Any
    /// shortfall removes the pending trade unconditionally and returns
    /// FAILURE with zero mutation. Once the checks pass, the four-way
    /// transfer runs removals first so the additions cannot hit the
    /// capacity ceiling mid-transfer.
    fn settle_trade(
        &mut self,
        agents: &mut AgentRegistry,
        proposal_id: &ProposalId,
    ) -> Result<ActionOutcome, ExecError> {
        // Check-and-remove is atomic here: the trade leaves the ledger on
        // every resolution path below, success or failure.
        let Some(trade) = self.ledger.remove(proposal_id) else {
            return Ok(ActionOutcome::failure(format!(
                "Trade proposal not found: {proposal_id}"
            )));
        };

        let (Some(proposer), Some(target)) =
            (agents.get(&trade.proposer_id), agents.get(&trade.target_id))
        else {
            return Ok(ActionOutcome::failure(
                "One or both trade parties no longer exist",
            ));
        };

        for (item_type, quantity) in per_item_totals(&trade.offered_items) {
            if u64::from(proposer.held(item_type)) < quantity {
                return Ok(ActionOutcome::failure(format!(
                    "Proposer no longer has sufficient {item_type}"
                )));
            }
        }
        for (item_type, quantity) in per_item_totals(&trade.requested_items) {
            if u64::from(target.held(item_type)) < quantity {
                return Ok(ActionOutcome::failure(format!(
                    "Target no longer has sufficient {item_type}"
                )));
            }
        }

        let offered_total = total_units(&trade.offered_items);
        let requested_total = total_units(&trade.requested_items);
        if requested_total > offered_total {
            let net = requested_total.saturating_sub(offered_total);
            if u64::from(proposer.inventory_space()) < net {
                return Ok(ActionOutcome::failure(
                    "Proposer lacks inventory space to complete trade",
                ));
            }
        }
        if offered_total > requested_total {
            let net = offered_total.saturating_sub(requested_total);
            if u64::from(target.inventory_space()) < net {
                return Ok(ActionOutcome::failure(
                    "Target lacks inventory space to complete trade",
                ));
            }
        }

        for item in &trade.offered_items {
            agents.adjust_inventory(
                &trade.proposer_id,
                &item.item_type,
                -i64::from(item.quantity),
            )?;
        }
        for item in &trade.requested_items {
            agents.adjust_inventory(
                &trade.target_id,
                &item.item_type,
                -i64::from(item.quantity),
            )?;
        }
        for item in &trade.offered_items {
            agents.adjust_inventory(&trade.target_id, &item.item_type, i64::from(item.quantity))?;
        }
        for item in &trade.requested_items {
            agents.adjust_inventory(
                &trade.proposer_id,
                &item.item_type,
                i64::from(item.quantity),
            )?;
        }

        Ok(ActionOutcome::success("Trade completed")
            .with_change("proposal_id", json!(trade.proposal_id))
            .with_change("proposer_id", json!(trade.proposer_id))
            .with_change("target_id", json!(trade.target_id))
            .with_change(
                "items_exchanged",
                json!({
                    "proposer_gave": trade.offered_items,
                    "target_gave": trade.requested_items,
                }),
            ))
    }

    fn handle_group_action(
        agents: &AgentRegistry,
        agent_id: &AgentId,
        kind: agora_types::GroupActionKind,
        group_id: Option<agora_types::GroupId>,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> ActionOutcome {
        if agents.get(agent_id).is_none() {
            return ActionOutcome::failure(format!("Agent not found: {agent_id}"));
        }

        ActionOutcome::success(format!("Group action queued: {kind}")).with_side_effect(
            SideEffect::GroupAction {
                agent_id: agent_id.clone(),
                group_action_type: kind.wire_tag().to_owned(),
                group_id,
                payload,
            },
        )
    }

    fn handle_idle(agents: &AgentRegistry, agent_id: &AgentId, reason: &str) -> ActionOutcome {
        if agents.get(agent_id).is_none() {
            return ActionOutcome::failure(format!("Agent not found: {agent_id}"));
        }
        if reason.is_empty() {
            ActionOutcome::success("Agent idle")
        } else {
            ActionOutcome::success(format!("Agent idle: {reason}"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use agora_agents::AgentSpec;
    use agora_world::{LocationEdge, LocationNode, Recipe};

    use super::*;

    fn world() -> LocationGraph {
        let mut graph = LocationGraph::new();
        graph.add_node(
            LocationNode::new("forest", "The Forest")
                .with_resource("wood", 50)
                .with_resource("wheat", 10),
        );
        graph.add_node(LocationNode::new("plains", "The Plains"));
        graph.add_node(LocationNode::new("cave", "The Cave"));
        graph.add_edge(LocationEdge::new("forest", "plains"));
        graph
    }

    fn recipes() -> RecipeBook {
        let mut book = RecipeBook::new();
        book.register(
            Recipe::new("plank", "Wooden Plank")
                .with_input("wood", 2)
                .with_output("plank", 1)
                .with_skill_gain("carpentry", 0.5),
        );
        book.register(
            Recipe::new("bundle", "Wheat Bundle")
                .with_input("wheat", 1)
                .with_output("bundle", 3),
        );
        book
    }

    fn setup() -> (ActionInterpreter, AgentRegistry, LocationGraph) {
        let mut agents = AgentRegistry::new();
        let _ = agents.spawn(AgentSpec {
            agent_id: Some(AgentId::new("a")),
            ..AgentSpec::named("Ada").at("forest")
        });
        let _ = agents.spawn(AgentSpec {
            agent_id: Some(AgentId::new("b")),
            ..AgentSpec::named("Ben").at("forest")
        });
        (ActionInterpreter::new(recipes()), agents, world())
    }

    fn act(agent: &str, body: ActionBody) -> Action {
        Action::new(AgentId::new(agent), body)
    }

    fn propose(agent: &str, target: &str, pid: &str, offered: Vec<TradeItem>, requested: Vec<TradeItem>) -> Action {
        act(
            agent,
            ActionBody::TradeProposal {
                target_agent_id: AgentId::new(target),
                offered_items: offered,
                requested_items: requested,
                proposal_id: ProposalId::new(pid),
            },
        )
    }

    fn accept(agent: &str, pid: &str, yes: bool) -> Action {
        act(
            agent,
            ActionBody::AcceptTrade {
                proposal_id: ProposalId::new(pid),
                accept: yes,
            },
        )
    }

    #[test]
    fn invalid_action_reports_all_errors_and_mutates_nothing() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "",
            ActionBody::Move {
                destination: agora_types::LocationId::new(""),
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Invalid);
        assert!(outcome.message.starts_with("Validation errors: "));
        assert!(outcome.message.contains("; "));
    }

    #[test]
    fn move_to_neighbor_succeeds() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Move {
                destination: agora_types::LocationId::new("plains"),
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Success);
        assert_eq!(outcome.message, "Moved from forest to plains");
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.location.clone()),
            Some(agora_types::LocationId::new("plains"))
        );
        assert_eq!(
            outcome.state_changes.get("new_location"),
            Some(&json!("plains"))
        );
    }

    #[test]
    fn move_to_non_neighbor_fails_without_moving() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Move {
                destination: agora_types::LocationId::new("cave"),
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Failure);
        assert_eq!(outcome.message, "No path from forest to cave");
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.location.clone()),
            Some(agora_types::LocationId::new("forest"))
        );
    }

    #[test]
    fn move_to_unknown_destination_fails() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Move {
                destination: agora_types::LocationId::new("atlantis"),
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.message, "Destination not found: atlantis");
    }

    #[test]
    fn harvest_caps_at_free_space() {
        // Requested 5, richness 10, but only 3 units of space: PARTIAL 3.
        let (mut interp, mut agents, world) = setup();
        if let Some(agent) = agents.get_mut(&AgentId::new("a")) {
            agent.capacity = 3;
        }
        let action = act(
            "a",
            ActionBody::Harvest {
                resource_type: ItemId::new("wheat"),
                amount: 5,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Partial);
        assert_eq!(outcome.message, "Harvested 3 wheat");
        assert_eq!(
            outcome.state_changes.get("amount_harvested"),
            Some(&json!(3))
        );
    }

    #[test]
    fn harvest_caps_at_richness() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Harvest {
                resource_type: ItemId::new("wheat"),
                amount: 25,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Partial);
        assert_eq!(outcome.message, "Harvested 10 wheat");
    }

    #[test]
    fn harvest_unavailable_resource_fails() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Harvest {
                resource_type: ItemId::new("gold"),
                amount: 1,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(
            outcome.message,
            "Resource 'gold' not available at The Forest"
        );
    }

    #[test]
    fn harvest_with_full_inventory_fails() {
        let (mut interp, mut agents, world) = setup();
        if let Some(agent) = agents.get_mut(&AgentId::new("a")) {
            agent.capacity = 2;
            agent.inventory.insert(ItemId::new("stone"), 2);
        }
        let action = act(
            "a",
            ActionBody::Harvest {
                resource_type: ItemId::new("wood"),
                amount: 1,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.message, "Inventory full");
    }

    #[test]
    fn craft_consumes_inputs_and_grants_skill() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wood"), 6);
        let action = act(
            "a",
            ActionBody::Craft {
                recipe_id: agora_types::RecipeId::new("plank"),
                quantity: 2,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Success);
        assert_eq!(outcome.message, "Crafted 2x plank");
        let agent = agents.get(&AgentId::new("a")).unwrap();
        assert_eq!(agent.held(&ItemId::new("wood")), 2);
        assert_eq!(agent.held(&ItemId::new("plank")), 2);
        assert_eq!(agent.skills.get("carpentry").copied(), Some(1.0));
    }

    #[test]
    fn craft_with_insufficient_inputs_fails_without_mutation() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wood"), 3);
        let action = act(
            "a",
            ActionBody::Craft {
                recipe_id: agora_types::RecipeId::new("plank"),
                quantity: 2,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.message, "Insufficient wood: need 4, have 3");
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.held(&ItemId::new("wood"))),
            Some(3)
        );
    }

    #[test]
    fn craft_that_grows_inventory_needs_space() {
        // bundle: 1 wheat -> 3 bundles, net +2 per craft.
        let (mut interp, mut agents, world) = setup();
        if let Some(agent) = agents.get_mut(&AgentId::new("a")) {
            agent.capacity = 2;
            agent.inventory.insert(ItemId::new("wheat"), 1);
        }
        let action = act(
            "a",
            ActionBody::Craft {
                recipe_id: agora_types::RecipeId::new("bundle"),
                quantity: 1,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(
            outcome.message,
            "Insufficient inventory space for crafted items"
        );
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(1)
        );
    }

    #[test]
    fn unknown_recipe_fails() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Craft {
                recipe_id: agora_types::RecipeId::new("spaceship"),
                quantity: 1,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.message, "Unknown recipe: spaceship");
    }

    #[test]
    fn direct_message_to_unknown_recipient_fails() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Message {
                recipient_id: Some(AgentId::new("ghost")),
                channel: Channel::Direct,
                content: "hello?".to_owned(),
                location_id: None,
                group_id: None,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.message, "Recipient not found: ghost");
    }

    #[test]
    fn location_message_queues_side_effect() {
        let (mut interp, mut agents, world) = setup();
        let action = act(
            "a",
            ActionBody::Message {
                recipient_id: None,
                channel: Channel::Location,
                content: "hello all".to_owned(),
                location_id: None,
                group_id: None,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Success);
        assert_eq!(outcome.message, "Message queued (location)");
        assert!(matches!(
            outcome.side_effects.first(),
            Some(SideEffect::Message { sender_location, .. })
                if sender_location.as_str() == "forest"
        ));
    }

    #[test]
    fn trade_proposal_registers_pending_trade() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 5);
        let action = propose(
            "a",
            "b",
            "p1",
            vec![TradeItem::new("wheat", 5)],
            vec![TradeItem::new("wood", 3)],
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.result, OutcomeKind::Success);
        assert_eq!(outcome.message, "Trade proposal created: p1");
        assert_eq!(interp.ledger().len(), 1);
        assert!(matches!(
            outcome.side_effects.first(),
            Some(SideEffect::TradeProposal { .. })
        ));
    }

    #[test]
    fn trade_proposal_without_holdings_fails() {
        let (mut interp, mut agents, world) = setup();
        let action = propose(
            "a",
            "b",
            "p1",
            vec![TradeItem::new("wheat", 5)],
            vec![],
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.message, "Insufficient wheat to offer");
        assert!(interp.ledger().is_empty());
    }

    #[test]
    fn stale_trade_fails_at_settlement_and_is_removed() {
        // Propose while holdings are good, spend the target's wood, then
        // accept: settlement must fail, remove the trade, and leave both
        // inventories untouched.
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 5);
        let _ = agents.adjust_inventory(&AgentId::new("b"), &ItemId::new("wood"), 3);

        let outcome = interp.execute(
            &mut agents,
            &world,
            &propose(
                "a",
                "b",
                "p1",
                vec![TradeItem::new("wheat", 5)],
                vec![TradeItem::new("wood", 3)],
            ),
        );
        assert!(outcome.succeeded());
        assert_eq!(interp.ledger().len(), 1);

        // Intervening action spends the wood.
        let _ = agents.adjust_inventory(&AgentId::new("b"), &ItemId::new("wood"), -3);

        let outcome = interp.execute(&mut agents, &world, &accept("b", "p1", true));
        assert_eq!(outcome.result, OutcomeKind::Failure);
        assert!(outcome.message.contains("sufficient wood"));
        assert_eq!(interp.ledger().len(), 0);
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(5)
        );
        assert_eq!(
            agents.get(&AgentId::new("b")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(0)
        );
    }

    #[test]
    fn only_target_may_respond() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 5);
        let _ = interp.execute(
            &mut agents,
            &world,
            &propose("a", "b", "p1", vec![TradeItem::new("wheat", 5)], vec![]),
        );

        let outcome = interp.execute(&mut agents, &world, &accept("a", "p1", true));
        assert_eq!(outcome.message, "Only the target can respond to this trade");
        // The proposal survives an unauthorized response.
        assert_eq!(interp.ledger().len(), 1);
    }

    #[test]
    fn rejection_removes_the_trade() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 5);
        let _ = interp.execute(
            &mut agents,
            &world,
            &propose("a", "b", "p1", vec![TradeItem::new("wheat", 5)], vec![]),
        );

        let outcome = interp.execute(&mut agents, &world, &accept("b", "p1", false));
        assert_eq!(outcome.result, OutcomeKind::Success);
        assert_eq!(outcome.message, "Trade rejected");
        assert!(interp.ledger().is_empty());
        // Rejection moves nothing.
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(5)
        );
    }

    #[test]
    fn settlement_conserves_items_and_resolves_once() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 5);
        let _ = agents.adjust_inventory(&AgentId::new("b"), &ItemId::new("wood"), 3);

        let wheat_before = agents
            .get(&AgentId::new("a"))
            .unwrap()
            .held(&ItemId::new("wheat"))
            .saturating_add(agents.get(&AgentId::new("b")).unwrap().held(&ItemId::new("wheat")));
        let wood_before = agents
            .get(&AgentId::new("a"))
            .unwrap()
            .held(&ItemId::new("wood"))
            .saturating_add(agents.get(&AgentId::new("b")).unwrap().held(&ItemId::new("wood")));

        let _ = interp.execute(
            &mut agents,
            &world,
            &propose(
                "a",
                "b",
                "p1",
                vec![TradeItem::new("wheat", 5)],
                vec![TradeItem::new("wood", 3)],
            ),
        );
        let outcome = interp.execute(&mut agents, &world, &accept("b", "p1", true));
        assert_eq!(outcome.result, OutcomeKind::Success);
        assert_eq!(outcome.message, "Trade completed");

        let a = agents.get(&AgentId::new("a")).unwrap();
        let b = agents.get(&AgentId::new("b")).unwrap();
        assert_eq!(a.held(&ItemId::new("wheat")), 0);
        assert_eq!(a.held(&ItemId::new("wood")), 3);
        assert_eq!(b.held(&ItemId::new("wheat")), 5);
        assert_eq!(b.held(&ItemId::new("wood")), 0);
        assert_eq!(
            a.held(&ItemId::new("wheat")).saturating_add(b.held(&ItemId::new("wheat"))),
            wheat_before
        );
        assert_eq!(
            a.held(&ItemId::new("wood")).saturating_add(b.held(&ItemId::new("wood"))),
            wood_before
        );

        // No double settlement.
        let again = interp.execute(&mut agents, &world, &accept("b", "p1", true));
        assert_eq!(again.message, "Trade proposal not found: p1");
    }

    #[test]
    fn settlement_fails_when_receiver_lacks_space() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 5);
        if let Some(b) = agents.get_mut(&AgentId::new("b")) {
            b.capacity = 2;
        }

        let _ = interp.execute(
            &mut agents,
            &world,
            &propose("a", "b", "p1", vec![TradeItem::new("wheat", 5)], vec![]),
        );
        let outcome = interp.execute(&mut agents, &world, &accept("b", "p1", true));
        assert_eq!(outcome.result, OutcomeKind::Failure);
        assert_eq!(
            outcome.message,
            "Target lacks inventory space to complete trade"
        );
        assert!(interp.ledger().is_empty());
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(5)
        );
    }

    #[test]
    fn duplicate_lines_for_one_item_are_summed_at_proposal() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 5);
        let outcome = interp.execute(
            &mut agents,
            &world,
            &propose(
                "a",
                "b",
                "p1",
                vec![TradeItem::new("wheat", 3), TradeItem::new("wheat", 3)],
                vec![],
            ),
        );
        assert_eq!(outcome.message, "Insufficient wheat to offer");
        assert!(interp.ledger().is_empty());
    }

    #[test]
    fn settlement_with_duplicate_lines_is_all_or_nothing() {
        // The offered side lists wheat twice; once the proposer drops to
        // 5 the summed 6 must fail the holdings check before either line
        // is debited.
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 6);
        let _ = agents.adjust_inventory(&AgentId::new("b"), &ItemId::new("wood"), 1);
        let _ = interp.execute(
            &mut agents,
            &world,
            &propose(
                "a",
                "b",
                "p1",
                vec![TradeItem::new("wheat", 3), TradeItem::new("wheat", 3)],
                vec![TradeItem::new("wood", 1)],
            ),
        );
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), -1);

        let outcome = interp.execute(&mut agents, &world, &accept("b", "p1", true));
        assert_eq!(outcome.result, OutcomeKind::Failure);
        assert!(outcome.message.contains("sufficient wheat"));
        assert!(interp.ledger().is_empty());
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(5)
        );
        assert_eq!(
            agents.get(&AgentId::new("b")).map(|a| a.held(&ItemId::new("wood"))),
            Some(1)
        );
    }

    #[test]
    fn duplicate_lines_settle_when_holdings_cover_the_sum() {
        let (mut interp, mut agents, world) = setup();
        let _ = agents.adjust_inventory(&AgentId::new("a"), &ItemId::new("wheat"), 6);
        let _ = interp.execute(
            &mut agents,
            &world,
            &propose(
                "a",
                "b",
                "p1",
                vec![TradeItem::new("wheat", 3), TradeItem::new("wheat", 3)],
                vec![],
            ),
        );
        let outcome = interp.execute(&mut agents, &world, &accept("b", "p1", true));
        assert_eq!(outcome.message, "Trade completed");
        assert_eq!(
            agents.get(&AgentId::new("a")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(0)
        );
        assert_eq!(
            agents.get(&AgentId::new("b")).map(|a| a.held(&ItemId::new("wheat"))),
            Some(6)
        );
    }

    #[test]
    fn idle_succeeds_with_reason() {
        let (mut interp, mut agents, world) = setup();
        let outcome = interp.execute(
            &mut agents,
            &world,
            &Action::idle(AgentId::new("a"), "cooldown active"),
        );
        assert_eq!(outcome.result, OutcomeKind::Success);
        assert_eq!(outcome.message, "Agent idle: cooldown active");
    }

    #[test]
    fn group_action_forwards_payload() {
        let (mut interp, mut agents, world) = setup();
        let mut payload = serde_json::Map::new();
        payload.insert("charter".to_owned(), json!("woodcutters"));
        let action = act(
            "a",
            ActionBody::GroupAction {
                group_action_type: agora_types::GroupActionKind::FormGroup,
                group_id: None,
                payload,
            },
        );
        let outcome = interp.execute(&mut agents, &world, &action);
        assert_eq!(outcome.message, "Group action queued: FORM_GROUP");
        assert!(matches!(
            outcome.side_effects.first(),
            Some(SideEffect::GroupAction { group_action_type, .. })
                if group_action_type == "FORM_GROUP"
        ));
    }

    #[test]
    fn execute_batch_yields_one_outcome_per_action() {
        let (mut interp, mut agents, world) = setup();
        let actions = vec![
            Action::idle(AgentId::new("a"), ""),
            Action::idle(AgentId::new("ghost"), ""),
        ];
        let outcomes = interp.execute_batch(&mut agents, &world, &actions);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].result, OutcomeKind::Success);
        assert_eq!(outcomes[1].result, OutcomeKind::Failure);
    }
}
