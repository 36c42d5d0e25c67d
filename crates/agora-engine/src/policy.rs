//! A seeded heuristic policy for running the kernel without a
//! cognition layer.
//!
//! Priority order: craft anything the inventory covers, otherwise
//! harvest the richest local resource, otherwise wander to a random
//! neighbor. Deterministic for a given seed.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use agora_core::{ActionProvider, DecisionContext, ProviderError};
use agora_types::{Action, ActionBody};

/// Most units requested per harvest.
const HARVEST_BATCH: u32 = 5;

/// A simple survive-and-gather policy.
#[derive(Debug)]
pub struct SurvivalPolicy {
    rng: StdRng,
}

impl SurvivalPolicy {
    /// A policy whose wandering is driven by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ActionProvider for SurvivalPolicy {
    fn name(&self) -> &str {
        "survival-policy"
    }

    fn get_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Action, ProviderError> {
        let agent = ctx.agent;

        // Craft whenever the inputs are on hand and the result fits.
        for recipe_id in ctx.recipes.craftable(&agent.inventory) {
            let Some(recipe) = ctx.recipes.get(&recipe_id) else {
                continue;
            };
            if let Ok(net) = recipe.net_quantity_change(1) {
                if net <= i64::from(agent.inventory_space()) {
                    return Ok(Action::new(
                        agent.id.clone(),
                        ActionBody::Craft {
                            recipe_id,
                            quantity: 1,
                        },
                    ));
                }
            }
        }

        // Harvest the richest resource here.
        if agent.inventory_space() > 0 {
            if let Some(node) = ctx.world.get_node(&agent.location) {
                let richest = node
                    .resource_richness
                    .iter()
                    .filter(|(_, richness)| **richness > 0)
                    .max_by_key(|(_, richness)| **richness);
                if let Some((item, richness)) = richest {
                    let amount = (*richness).min(agent.inventory_space()).min(HARVEST_BATCH);
                    return Ok(Action::new(
                        agent.id.clone(),
                        ActionBody::Harvest {
                            resource_type: item.clone(),
                            amount,
                        },
                    ));
                }
            }
        }

        // Nothing here; wander.
        let neighbors = ctx.world.neighbors(&agent.location);
        if !neighbors.is_empty() {
            let destination = neighbors[self.rng.random_range(0..neighbors.len())].clone();
            return Ok(Action::new(
                agent.id.clone(),
                ActionBody::Move { destination },
            ));
        }

        Ok(Action::idle(agent.id.clone(), "Nothing worth doing here"))
    }
}
