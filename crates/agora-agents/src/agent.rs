//! The mutable state of a single agent.
//!
//! Needs are gauges clamped to `0..=100`; skills are non-negative
//! levels. Inventory mutation goes through the checked primitives in
//! [`crate::inventory`] so the capacity invariant cannot be bypassed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use agora_types::{AgentId, ItemId, LocationId};

use crate::error::AgentError;
use crate::inventory;

/// Default capacity for agents that do not specify one.
pub const DEFAULT_CAPACITY: u32 = 100;

/// The full state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Unique identifier (registry key).
    pub id: AgentId,
    /// Human-readable name.
    pub name: String,
    /// Where the agent currently is; empty until first placed.
    pub location: LocationId,
    /// Items held, by kind. Never holds zero-count entries.
    pub inventory: BTreeMap<ItemId, u32>,
    /// Maximum total inventory quantity.
    pub capacity: u32,
    /// Named need gauges, each clamped to `0..=100`.
    pub needs: BTreeMap<String, f64>,
    /// Named skill levels, each `>= 0`.
    pub skills: BTreeMap<String, f64>,
    /// Opaque attributes for collaborators outside the kernel.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// The standard starting needs: full food and shelter, neutral
/// reputation.
pub fn default_needs() -> BTreeMap<String, f64> {
    let mut needs = BTreeMap::new();
    needs.insert("food".to_owned(), 100.0);
    needs.insert("shelter".to_owned(), 100.0);
    needs.insert("reputation".to_owned(), 50.0);
    needs
}

impl AgentState {
    /// Create an agent with default capacity, default needs, and an
    /// empty inventory.
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: LocationId::default(),
            inventory: BTreeMap::new(),
            capacity: DEFAULT_CAPACITY,
            needs: default_needs(),
            skills: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Total units currently held across all item kinds.
    ///
    /// Saturates at `u32::MAX`; the registry keeps the real total at or
    /// below `capacity`.
    pub fn inventory_count(&self) -> u32 {
        inventory::total_quantity(&self.inventory).unwrap_or(u32::MAX)
    }

    /// Units of free inventory space remaining.
    pub fn inventory_space(&self) -> u32 {
        self.capacity.saturating_sub(self.inventory_count())
    }

    /// Units held of one item kind (0 when absent).
    pub fn held(&self, item: &ItemId) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    /// The need with the lowest gauge value, ties broken by name.
    pub fn most_urgent_need(&self) -> Option<&str> {
        self.needs
            .iter()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, _)| name.as_str())
    }

    /// Add items, honoring the capacity invariant.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::CapacityExceeded`] when the addition does
    /// not fit.
    pub fn add_items(&mut self, item: &ItemId, amount: u32) -> Result<(), AgentError> {
        inventory::add_item(&mut self.inventory, self.capacity, item, amount)
    }

    /// Remove items; the key disappears when its count reaches zero.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InsufficientItems`] when the agent holds
    /// fewer than `amount`.
    pub fn remove_items(&mut self, item: &ItemId, amount: u32) -> Result<(), AgentError> {
        inventory::remove_item(&mut self.inventory, item, amount)
    }

    /// Set a need gauge, clamped to `0..=100`.
    pub fn set_need(&mut self, need: impl Into<String>, value: f64) {
        self.needs.insert(need.into(), value.clamp(0.0, 100.0));
    }

    /// Lower an existing need gauge by `amount`, floored at zero.
    ///
    /// Needs the agent does not track are left untracked.
    pub fn decay_need(&mut self, need: &str, amount: f64) {
        if let Some(value) = self.needs.get_mut(need) {
            *value = (*value - amount).max(0.0);
        }
    }

    /// Adjust a skill level by a signed delta, floored at zero.
    pub fn adjust_skill(&mut self, skill: impl Into<String>, delta: f64) {
        let skill = skill.into();
        let current = self.skills.get(&skill).copied().unwrap_or(0.0);
        self.skills.insert(skill, (current + delta).max(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_has_default_needs() {
        let agent = AgentState::new("agent_0", "Ada");
        assert_eq!(agent.needs.get("food").copied(), Some(100.0));
        assert_eq!(agent.needs.get("shelter").copied(), Some(100.0));
        assert_eq!(agent.needs.get("reputation").copied(), Some(50.0));
        assert_eq!(agent.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn inventory_space_tracks_additions() {
        let mut agent = AgentState::new("agent_0", "Ada");
        agent.capacity = 10;
        assert!(agent.add_items(&ItemId::new("wood"), 4).is_ok());
        assert_eq!(agent.inventory_count(), 4);
        assert_eq!(agent.inventory_space(), 6);
    }

    #[test]
    fn most_urgent_need_is_lowest_gauge() {
        let mut agent = AgentState::new("agent_0", "Ada");
        agent.set_need("food", 20.0);
        assert_eq!(agent.most_urgent_need(), Some("food"));
        agent.set_need("shelter", 5.0);
        assert_eq!(agent.most_urgent_need(), Some("shelter"));
    }

    #[test]
    fn set_need_clamps_to_gauge_range() {
        let mut agent = AgentState::new("agent_0", "Ada");
        agent.set_need("food", 150.0);
        assert_eq!(agent.needs.get("food").copied(), Some(100.0));
        agent.set_need("food", -3.0);
        assert_eq!(agent.needs.get("food").copied(), Some(0.0));
    }

    #[test]
    fn decay_need_floors_at_zero_and_skips_untracked() {
        let mut agent = AgentState::new("agent_0", "Ada");
        agent.set_need("food", 0.4);
        agent.decay_need("food", 1.0);
        assert_eq!(agent.needs.get("food").copied(), Some(0.0));
        agent.decay_need("mana", 1.0);
        assert!(!agent.needs.contains_key("mana"));
    }

    #[test]
    fn skill_floor_is_zero() {
        let mut agent = AgentState::new("agent_0", "Ada");
        agent.adjust_skill("carpentry", 2.0);
        agent.adjust_skill("carpentry", -5.0);
        assert_eq!(agent.skills.get("carpentry").copied(), Some(0.0));
    }
}
