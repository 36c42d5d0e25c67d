//! Clamped resource regeneration over the world graph.
//!
//! Each world-update phase adds a per-resource rate to every location's
//! richness, clamped to a per-resource ceiling. A resource with no
//! configured ceiling grows without bound (matching a missing `max`
//! entry); a node already at or above its ceiling is left untouched.

use std::collections::BTreeMap;

use agora_types::ItemId;

use crate::graph::LocationGraph;

/// Apply one round of regeneration to every location in the graph.
///
/// Returns the number of (location, resource) cells that changed.
pub fn regenerate(
    graph: &mut LocationGraph,
    rates: &BTreeMap<ItemId, u32>,
    ceilings: &BTreeMap<ItemId, u32>,
) -> u64 {
    let mut cells_changed: u64 = 0;
    for node in graph.nodes_mut() {
        for (item, rate) in rates {
            let current = node.richness(item);
            let ceiling = ceilings.get(item).copied().unwrap_or(u32::MAX);
            if current < ceiling {
                let grown = current.saturating_add(*rate).min(ceiling);
                node.resource_richness.insert(item.clone(), grown);
                cells_changed = cells_changed.saturating_add(1);
            }
        }
    }
    cells_changed
}
