//! Typed YAML configuration for a simulation run.
//!
//! One document describes the world graph, the recipe book, the
//! starting population, the throttle limits, and the engine settings.
//! Everything except the world is optional; absent sections take the
//! same defaults as the corresponding constructors.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use agora_agents::{AgentRegistry, AgentSpec};
use agora_types::{AgentId, HookPhase, ItemId, LocationId};
use agora_world::{LocationEdge, LocationGraph, LocationNode, Recipe, RecipeBook};

use crate::builtins::ResourceRegenerationHook;
use crate::decision::ActionProvider;
use crate::engine::TickEngine;
use crate::error::CoreError;
use crate::hooks::HookManager;
use crate::throttle::{RateLimiter, ThrottleConfig};

const fn default_ticks() -> u64 {
    100
}

/// Engine-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Shuffle seed; omitted means ascending id order every tick.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Minimum wall-clock milliseconds per tick (0 = unpaced).
    #[serde(default)]
    pub tick_interval_ms: u64,
    /// Warmup ticks to run before the main loop.
    #[serde(default)]
    pub warmup_ticks: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: None,
            ticks: default_ticks(),
            tick_interval_ms: 0,
            warmup_ticks: 0,
        }
    }
}

/// Per-tick resource regeneration settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegenSettings {
    /// Units regrown per resource per tick.
    #[serde(default)]
    pub rates: BTreeMap<ItemId, u32>,
    /// Richness ceiling per resource; absent means unbounded.
    #[serde(default)]
    pub ceilings: BTreeMap<ItemId, u32>,
}

/// The world section: locations, edges, and regeneration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldConfig {
    /// All locations.
    #[serde(default)]
    pub locations: Vec<LocationNode>,
    /// All edges.
    #[serde(default)]
    pub edges: Vec<LocationEdge>,
    /// Regeneration behavior.
    #[serde(default)]
    pub regeneration: RegenSettings,
}

/// One starting agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSeed {
    /// Explicit id; generated when absent.
    #[serde(default)]
    pub id: Option<AgentId>,
    /// Display name.
    pub name: String,
    /// Starting location (must exist in the world section).
    pub location: LocationId,
    /// Starting inventory.
    #[serde(default)]
    pub inventory: BTreeMap<ItemId, u32>,
    /// Carrying capacity; defaults to the registry default.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Starting needs; defaults to the standard gauges.
    #[serde(default)]
    pub needs: Option<BTreeMap<String, f64>>,
    /// Starting skills.
    #[serde(default)]
    pub skills: BTreeMap<String, f64>,
}

/// The whole run, as loaded from one YAML document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Provider throttle limits.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// The world graph.
    #[serde(default)]
    pub world: WorldConfig,
    /// The recipe book.
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    /// The starting population.
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
}

impl SimulationConfig {
    /// Parse a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Parse`] on malformed YAML and
    /// [`CoreError::InvalidConfig`] when the document fails validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Io`] when the file cannot be read, plus the
    /// errors of [`SimulationConfig::from_yaml_str`].
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check cross-references the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the first problem.
    pub fn validate(&self) -> Result<(), CoreError> {
        let known: std::collections::BTreeSet<&LocationId> =
            self.world.locations.iter().map(|n| &n.id).collect();

        for edge in &self.world.edges {
            for end in [&edge.from, &edge.to] {
                if !known.contains(end) {
                    return Err(CoreError::InvalidConfig {
                        reason: format!("edge references unknown location '{end}'"),
                    });
                }
            }
        }
        for agent in &self.agents {
            if !known.contains(&agent.location) {
                return Err(CoreError::InvalidConfig {
                    reason: format!(
                        "agent '{}' starts at unknown location '{}'",
                        agent.name, agent.location
                    ),
                });
            }
        }
        if self.engine.ticks == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "engine.ticks must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// Build the world graph this configuration describes.
    pub fn build_world(&self) -> LocationGraph {
        let mut world = LocationGraph::new();
        for node in &self.world.locations {
            world.add_node(node.clone());
        }
        for edge in &self.world.edges {
            world.add_edge(edge.clone());
        }
        world
    }

    /// Build the recipe book.
    pub fn build_recipes(&self) -> RecipeBook {
        let mut book = RecipeBook::new();
        for recipe in &self.recipes {
            book.register(recipe.clone());
        }
        book
    }

    /// Spawn the starting population.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] on duplicate explicit ids.
    pub fn build_agents(&self) -> Result<AgentRegistry, CoreError> {
        let mut registry = AgentRegistry::new();
        for seed in &self.agents {
            let spec = AgentSpec {
                agent_id: seed.id.clone(),
                name: seed.name.clone(),
                location: seed.location.clone(),
                inventory: seed.inventory.clone(),
                capacity: seed.capacity,
                needs: seed.needs.clone(),
                skills: seed.skills.clone(),
                attributes: BTreeMap::new(),
            };
            registry.spawn(spec).map_err(|e| CoreError::InvalidConfig {
                reason: format!("cannot spawn agent '{}': {e}", seed.name),
            })?;
        }
        Ok(registry)
    }

    /// Assemble a ready-to-run engine around `provider`.
    ///
    /// Registers the resource-regeneration hook when the configuration
    /// carries regeneration rates.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SimulationConfig::build_agents`].
    pub fn build_engine(&self, provider: Box<dyn ActionProvider>) -> Result<TickEngine, CoreError> {
        let mut hooks = HookManager::new();
        if !self.world.regeneration.rates.is_empty() {
            hooks.register(
                HookPhase::WorldUpdate,
                Box::new(ResourceRegenerationHook::new(
                    self.world.regeneration.rates.clone(),
                    self.world.regeneration.ceilings.clone(),
                )),
            );
        }

        let mut engine = TickEngine::new(
            self.build_world(),
            self.build_agents()?,
            self.build_recipes(),
            provider,
        )
        .with_limiter(RateLimiter::new(self.throttle.clone()))
        .with_tick_interval(Duration::from_millis(self.engine.tick_interval_ms));
        if let Some(seed) = self.engine.seed {
            engine = engine.with_seed(seed);
        }
        *engine.hooks_mut() = hooks;
        Ok(engine)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
engine:
  seed: 7
  ticks: 20
world:
  locations:
    - id: forest
      name: The Forest
      location_type: forest
      resource_richness:
        wood: 50
    - id: plains
      name: The Plains
      location_type: plains
  edges:
    - from: forest
      to: plains
      distance: 2.0
  regeneration:
    rates:
      wood: 2
    ceilings:
      wood: 60
recipes:
  - id: plank
    name: Wooden Plank
    inputs:
      wood: 2
    outputs:
      plank: 1
agents:
  - name: Ada
    location: forest
    inventory:
      wood: 4
  - id: ben
    name: Ben
    location: plains
    capacity: 20
";

    #[test]
    fn sample_config_parses_and_builds() {
        let config = SimulationConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.engine.seed, Some(7));
        assert_eq!(config.engine.ticks, 20);
        assert_eq!(config.engine.tick_interval_ms, 0);

        let world = config.build_world();
        assert_eq!(world.node_count(), 2);
        assert!(world
            .travel_cost(&LocationId::new("forest"), &LocationId::new("plains"))
            .is_some());

        let agents = config.build_agents().unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(
            agents.get(&AgentId::new("ben")).map(|a| a.capacity),
            Some(20)
        );

        assert_eq!(config.build_recipes().len(), 1);
    }

    #[test]
    fn throttle_section_defaults_when_absent() {
        let config = SimulationConfig::from_yaml_str(SAMPLE).unwrap();
        assert!((config.throttle.base_cooldown_secs - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.throttle.mandatory_rest_interval, 5);
    }

    #[test]
    fn unknown_agent_location_is_rejected() {
        let bad = r"
world:
  locations:
    - id: forest
      name: Forest
      location_type: forest
agents:
  - name: Lost
    location: nowhere
";
        let err = SimulationConfig::from_yaml_str(bad);
        assert!(matches!(err, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let bad = r"
world:
  locations:
    - id: forest
      name: Forest
      location_type: forest
  edges:
    - from: forest
      to: void
";
        let err = SimulationConfig::from_yaml_str(bad);
        assert!(matches!(err, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn built_engine_runs_with_regeneration() {
        use crate::decision::IdleProvider;

        let config = SimulationConfig::from_yaml_str(SAMPLE).unwrap();
        let mut engine = config.build_engine(Box::new(IdleProvider)).unwrap();
        let _ = engine.execute_tick();
        // One regeneration round: 50 + 2.
        assert_eq!(
            engine
                .world()
                .get_node(&LocationId::new("forest"))
                .map(|n| n.richness(&ItemId::new("wood"))),
            Some(52)
        );
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = SimulationConfig::from_yaml_str(": not yaml : [");
        assert!(matches!(err, Err(CoreError::Parse(_))));
    }
}
