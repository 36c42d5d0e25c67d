//! The agent registry: the only way agents enter or leave the world.
//!
//! The registry owns every [`AgentState`] and exposes sanctioned
//! mutation methods for the interpreter and lifecycle hooks. Iteration
//! order is always ascending agent id, which is what makes unseeded
//! tick scheduling deterministic.

use std::collections::BTreeMap;

use tracing::debug;

use agora_types::{AgentId, ItemId, LocationId};

use crate::agent::{AgentState, DEFAULT_CAPACITY, default_needs};
use crate::error::AgentError;

/// Parameters for spawning a new agent.
///
/// Everything except the name is optional; unset fields take the same
/// defaults as [`AgentState::new`].
#[derive(Debug, Clone, Default)]
pub struct AgentSpec {
    /// Explicit id; generated (`agent_N`) when absent.
    pub agent_id: Option<AgentId>,
    /// Human-readable name.
    pub name: String,
    /// Starting location.
    pub location: LocationId,
    /// Starting inventory.
    pub inventory: BTreeMap<ItemId, u32>,
    /// Carrying capacity; defaults to [`DEFAULT_CAPACITY`].
    pub capacity: Option<u32>,
    /// Starting needs; defaults to [`default_needs`].
    pub needs: Option<BTreeMap<String, f64>>,
    /// Starting skills.
    pub skills: BTreeMap<String, f64>,
    /// Opaque attributes.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl AgentSpec {
    /// A spec with just a name; everything else defaulted.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the starting location, consuming and returning the spec.
    #[must_use]
    pub fn at(mut self, location: impl Into<LocationId>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the carrying capacity, consuming and returning the spec.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Add a starting item, consuming and returning the spec.
    #[must_use]
    pub fn with_item(mut self, item: impl Into<ItemId>, quantity: u32) -> Self {
        self.inventory.insert(item.into(), quantity);
        self
    }
}

/// Owns all agents and hands out sanctioned mutations.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, AgentState>,
    next_id: u64,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&mut self) -> AgentId {
        let id = AgentId::new(format!("agent_{}", self.next_id));
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Spawn a new agent from a spec.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateAgent`] when the spec carries an
    /// explicit id that is already registered.
    pub fn spawn(&mut self, spec: AgentSpec) -> Result<AgentId, AgentError> {
        let id = match spec.agent_id {
            Some(id) => {
                if self.agents.contains_key(&id) {
                    return Err(AgentError::DuplicateAgent(id));
                }
                id
            }
            None => self.generate_id(),
        };

        let agent = AgentState {
            id: id.clone(),
            name: spec.name,
            location: spec.location,
            inventory: spec.inventory,
            capacity: spec.capacity.unwrap_or(DEFAULT_CAPACITY),
            needs: spec.needs.unwrap_or_else(default_needs),
            skills: spec.skills,
            attributes: spec.attributes,
        };

        debug!(agent_id = %id, name = %agent.name, location = %agent.location, "agent spawned");
        self.agents.insert(id.clone(), agent);
        Ok(id)
    }

    /// Look up an agent by id.
    pub fn get(&self, id: &AgentId) -> Option<&AgentState> {
        self.agents.get(id)
    }

    /// Look up an agent mutably.
    pub fn get_mut(&mut self, id: &AgentId) -> Option<&mut AgentState> {
        self.agents.get_mut(id)
    }

    /// Remove an agent; returns `true` when one was present.
    pub fn remove(&mut self, id: &AgentId) -> bool {
        let removed = self.agents.remove(id).is_some();
        if removed {
            debug!(agent_id = %id, "agent removed");
        }
        removed
    }

    /// All agent ids in ascending order.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    /// Iterate all agents in id order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentState> {
        self.agents.values()
    }

    /// Iterate all agents mutably, in id order.
    pub fn agents_mut(&mut self) -> impl Iterator<Item = &mut AgentState> {
        self.agents.values_mut()
    }

    /// Agents currently at a location, in id order.
    pub fn agents_at(&self, location: &LocationId) -> Vec<&AgentState> {
        self.agents
            .values()
            .filter(|a| a.location == *location)
            .collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Move an agent to a new location.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for unknown ids.
    pub fn update_location(
        &mut self,
        id: &AgentId,
        location: LocationId,
    ) -> Result<(), AgentError> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| AgentError::AgentNotFound(id.clone()))?;
        agent.location = location;
        Ok(())
    }

    /// Apply a signed quantity delta to one item in an agent's
    /// inventory, honoring the capacity and non-negativity invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for unknown ids,
    /// [`AgentError::CapacityExceeded`] when a positive delta does not
    /// fit, and [`AgentError::InsufficientItems`] when a negative delta
    /// would take the count below zero.
    pub fn adjust_inventory(
        &mut self,
        id: &AgentId,
        item: &ItemId,
        delta: i64,
    ) -> Result<(), AgentError> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| AgentError::AgentNotFound(id.clone()))?;
        let magnitude =
            u32::try_from(delta.unsigned_abs()).map_err(|_| AgentError::ArithmeticOverflow {
                context: String::from("inventory delta exceeds u32"),
            })?;
        if delta >= 0 {
            agent.add_items(item, magnitude)
        } else {
            agent.remove_items(item, magnitude)
        }
    }

    /// Set an agent's need gauge, clamped to `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for unknown ids.
    pub fn set_need(&mut self, id: &AgentId, need: &str, value: f64) -> Result<(), AgentError> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| AgentError::AgentNotFound(id.clone()))?;
        agent.set_need(need, value);
        Ok(())
    }

    /// Adjust an agent's skill level by a signed delta, floored at zero.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for unknown ids.
    pub fn adjust_skill(
        &mut self,
        id: &AgentId,
        skill: &str,
        delta: f64,
    ) -> Result<(), AgentError> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| AgentError::AgentNotFound(id.clone()))?;
        agent.adjust_skill(skill, delta);
        Ok(())
    }

    /// Remove every agent and reset id generation.
    pub fn clear(&mut self) {
        self.agents.clear();
        self.next_id = 0;
    }
}
