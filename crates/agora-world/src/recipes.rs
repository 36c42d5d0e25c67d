//! Crafting recipes and the book that holds them.
//!
//! A recipe converts input items into output items and optionally grants
//! skill points per craft. The book only answers questions -- it never
//! touches an inventory; the action interpreter applies the exchanges it
//! computes here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use agora_types::{ItemId, RecipeId};

use crate::error::WorldError;

/// A crafting recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Unique identifier (book key).
    pub id: RecipeId,
    /// Human-readable name.
    pub name: String,
    /// Items consumed per single craft.
    #[serde(default)]
    pub inputs: BTreeMap<ItemId, u32>,
    /// Items produced per single craft.
    #[serde(default)]
    pub outputs: BTreeMap<ItemId, u32>,
    /// Skill points granted per single craft, by skill name.
    #[serde(default)]
    pub skill_gains: BTreeMap<String, f64>,
}

impl Recipe {
    /// Create a recipe with no inputs, outputs, or skill gains.
    pub fn new(id: impl Into<RecipeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            skill_gains: BTreeMap::new(),
        }
    }

    /// Add an input requirement, consuming and returning the recipe.
    #[must_use]
    pub fn with_input(mut self, item: impl Into<ItemId>, count: u32) -> Self {
        self.inputs.insert(item.into(), count);
        self
    }

    /// Add an output, consuming and returning the recipe.
    #[must_use]
    pub fn with_output(mut self, item: impl Into<ItemId>, count: u32) -> Self {
        self.outputs.insert(item.into(), count);
        self
    }

    /// Add a skill gain, consuming and returning the recipe.
    #[must_use]
    pub fn with_skill_gain(mut self, skill: impl Into<String>, gain: f64) -> Self {
        self.skill_gains.insert(skill.into(), gain);
        self
    }

    /// Verify an inventory can cover `quantity` crafts of this recipe.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InsufficientInput`] naming the first lacking
    /// item, or [`WorldError::ArithmeticOverflow`] when the scaled
    /// requirement does not fit in `u32`.
    pub fn check_inputs(
        &self,
        inventory: &BTreeMap<ItemId, u32>,
        quantity: u32,
    ) -> Result<(), WorldError> {
        for (item, count) in &self.inputs {
            let required = count
                .checked_mul(quantity)
                .ok_or(WorldError::ArithmeticOverflow)?;
            let have = inventory.get(item).copied().unwrap_or(0);
            if have < required {
                return Err(WorldError::InsufficientInput {
                    item: item.clone(),
                    required,
                    have,
                });
            }
        }
        Ok(())
    }

    /// Net change in total inventory quantity for `quantity` crafts.
    ///
    /// Positive means the craft grows the inventory and needs that much
    /// free space.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ArithmeticOverflow`] when totals do not fit.
    pub fn net_quantity_change(&self, quantity: u32) -> Result<i64, WorldError> {
        let total = |items: &BTreeMap<ItemId, u32>| -> Result<i64, WorldError> {
            let mut sum: i64 = 0;
            for count in items.values() {
                let scaled = i64::from(*count)
                    .checked_mul(i64::from(quantity))
                    .ok_or(WorldError::ArithmeticOverflow)?;
                sum = sum
                    .checked_add(scaled)
                    .ok_or(WorldError::ArithmeticOverflow)?;
            }
            Ok(sum)
        };
        let output_total = total(&self.outputs)?;
        let input_total = total(&self.inputs)?;
        output_total
            .checked_sub(input_total)
            .ok_or(WorldError::ArithmeticOverflow)
    }
}

/// The set of recipes known to the simulation, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeBook {
    recipes: BTreeMap<RecipeId, Recipe>,
}

impl RecipeBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recipe, replacing any existing one with the same id.
    pub fn register(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.id.clone(), recipe);
    }

    /// Look up a recipe by id.
    pub fn get(&self, id: &RecipeId) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    /// Number of registered recipes.
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Whether the book holds no recipes.
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Ids of recipes the inventory could craft once, in id order.
    pub fn craftable(&self, inventory: &BTreeMap<ItemId, u32>) -> Vec<RecipeId> {
        self.recipes
            .iter()
            .filter(|(_, recipe)| recipe.check_inputs(inventory, 1).is_ok())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plank_recipe() -> Recipe {
        Recipe::new("plank", "Wooden Plank")
            .with_input("wood", 2)
            .with_output("plank", 1)
            .with_skill_gain("carpentry", 0.5)
    }

    fn inventory(pairs: &[(&str, u32)]) -> BTreeMap<ItemId, u32> {
        pairs
            .iter()
            .map(|(k, v)| (ItemId::new(*k), *v))
            .collect()
    }

    #[test]
    fn check_inputs_scales_with_quantity() {
        let recipe = plank_recipe();
        let inv = inventory(&[("wood", 5)]);
        assert!(recipe.check_inputs(&inv, 2).is_ok());
        let err = recipe.check_inputs(&inv, 3);
        assert!(matches!(
            err,
            Err(WorldError::InsufficientInput { required: 6, have: 5, .. })
        ));
    }

    #[test]
    fn insufficient_input_message_names_item() {
        let recipe = plank_recipe();
        let err = recipe.check_inputs(&inventory(&[]), 1);
        assert_eq!(
            err.map_err(|e| e.to_string()).err(),
            Some("need 2 wood, have 0".to_owned())
        );
    }

    #[test]
    fn net_quantity_change_can_shrink_inventory() {
        // 2 wood in, 1 plank out: net -1 per craft.
        let recipe = plank_recipe();
        assert_eq!(recipe.net_quantity_change(1).ok(), Some(-1));
        assert_eq!(recipe.net_quantity_change(4).ok(), Some(-4));
    }

    #[test]
    fn craftable_filters_by_inputs() {
        let mut book = RecipeBook::new();
        book.register(plank_recipe());
        book.register(
            Recipe::new("bread", "Bread")
                .with_input("wheat", 3)
                .with_output("bread", 1),
        );
        let ids = book.craftable(&inventory(&[("wood", 2)]));
        assert_eq!(ids, vec![RecipeId::new("plank")]);
    }

    #[test]
    fn register_replaces_by_id() {
        let mut book = RecipeBook::new();
        book.register(plank_recipe());
        book.register(Recipe::new("plank", "Better Plank"));
        assert_eq!(book.len(), 1);
        assert_eq!(
            book.get(&RecipeId::new("plank")).map(|r| r.name.clone()),
            Some("Better Plank".to_owned())
        );
    }
}
